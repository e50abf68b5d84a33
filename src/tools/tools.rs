use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use corec::driver::{cli::Args, env, interp, lsp, run_sources, FrontEnd, UnavailableFrontEnd};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_sink.as_deref());

    let opts = args.to_compile_options()?;
    if let Some(advisory) = env::malloc_nano_zone_advisory(opts.target.os) {
        tracing::warn!("{advisory}");
    }
    let _sdkroot = env::resolve_sdkroot(opts.sysroot.as_ref(), opts.target.os);

    let front_end = UnavailableFrontEnd;

    if args.lsp {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        for line in std::io::BufRead::lines(stdin.lock()) {
            let path: PathBuf = line?.into();
            let source = std::fs::read_to_string(&path)?;
            lsp::check_document(
                &front_end,
                &path.display().to_string(),
                &source,
                &opts,
                &mut stdout,
            )?;
        }
        return Ok(());
    }

    if args.interp {
        let Some(source_path) = args.inputs.first() else {
            anyhow::bail!("--interp needs exactly one input source");
        };
        let source = std::fs::read_to_string(source_path)?;
        let tu = front_end.build_ast(&source, &opts)?;
        let unit = corec::builder::build_translation_unit(&tu, opts.target)?;
        let code = interp::run(&unit, "main")?;
        std::process::exit(code as i32);
    }

    let code = run_sources(&front_end, &args.inputs, &opts)?;
    std::process::exit(code);
}

fn init_logging(sink: Option<&str>) {
    if sink == Some("off") {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match sink {
        None | Some("-") => subscriber.init(),
        Some(_path) => subscriber.init(), // a real build would redirect to the path
    }
}
