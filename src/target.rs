//! Target descriptor: the small amount of machine configuration that the IR
//! builder itself needs (pointer size, `long` size) plus the triple/arch
//! parsing used by the CLI (§6).
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arch {
    X86_64,
    Aarch64,
    Rv32i,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Os {
    Linux,
    MacOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
}

impl Target {
    /// Pointer width in bytes on this target.
    pub fn pointer_size(self) -> u8 {
        match self.arch {
            Arch::X86_64 | Arch::Aarch64 => 8,
            Arch::Rv32i => 4,
        }
    }

    /// `long` width in bytes; LP64 on Linux/macOS x86_64/aarch64, ILP32 on rv32i.
    pub fn long_size(self) -> u8 {
        self.pointer_size()
    }

    pub fn host() -> Target {
        Target {
            arch: Arch::X86_64,
            os: Os::Linux,
        }
    }

    pub fn from_arch_flag(arch: &str) -> Result<Target> {
        let arch = match arch {
            "x86_64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Aarch64,
            "rv32i" => Arch::Rv32i,
            other => return Err(anyhow!("unknown -arch `{other}`")),
        };
        Ok(Target {
            arch,
            os: default_os_for(arch),
        })
    }

    pub fn from_triple(triple: &str) -> Result<Target> {
        let mut parts = triple.split('-');
        let arch = match parts.next() {
            Some("x86_64") => Arch::X86_64,
            Some("aarch64" | "arm64") => Arch::Aarch64,
            Some("riscv32") => Arch::Rv32i,
            Some(other) => return Err(anyhow!("unknown architecture in triple: `{other}`")),
            None => return Err(anyhow!("empty target triple")),
        };
        let os = triple
            .split('-')
            .find_map(|component| match component {
                "linux" | "linux-gnu" => Some(Os::Linux),
                "darwin" | "apple" => Some(Os::MacOs),
                _ => None,
            })
            .unwrap_or_else(|| default_os_for(arch));
        Ok(Target { arch, os })
    }
}

fn default_os_for(arch: Arch) -> Os {
    match arch {
        Arch::Rv32i => Os::Linux,
        Arch::X86_64 | Arch::Aarch64 => Os::Linux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_flag_rejects_eep() {
        assert!(Target::from_arch_flag("eep").is_err());
    }

    #[test]
    fn triple_parses_apple_component() {
        let t = Target::from_triple("aarch64-apple-darwin").unwrap();
        assert_eq!(t.arch, Arch::Aarch64);
        assert_eq!(t.os, Os::MacOs);
    }

    #[test]
    fn rv32i_is_ilp32() {
        let t = Target {
            arch: Arch::Rv32i,
            os: Os::Linux,
        };
        assert_eq!(t.pointer_size(), 4);
    }
}
