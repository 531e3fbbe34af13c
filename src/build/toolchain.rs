//! The ARM module toolchain: fixed flags and command shapes.

use std::path::{Path, PathBuf};

use super::process::ToolCommand;
use crate::config::ToolchainConfig;

/// Position-independent Thumb code addressed through a single PIC base
/// register (r9), so the module can be loaded anywhere in flash.
pub const COMPILE_FLAGS: &str = "-c -g0 -O3 -fPIE -msingle-pic-base -mpic-register=r9 \
    -fomit-frame-pointer -mno-pic-data-is-text-relative -mlong-calls -mthumb \
    -mpoke-function-name";

/// No startup files or libraries; relocations are kept for the packager and
/// unresolved symbols are bound by the runtime loader.
pub const LINK_FLAGS: &str = "-gdwarf-4 -nostartfiles -nodefaultlibs -nostdlib \
    -Wl,--unresolved-symbols=ignore-in-object-files -Wl,--emit-relocs -Wl,-e,0";

#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler: PathBuf,
    pub linker: PathBuf,
    pub renamer: PathBuf,
    pub packager: PathBuf,
    pub linker_script: PathBuf,
    pub include_dir: PathBuf,
}

impl Toolchain {
    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            linker: config.linker.clone(),
            renamer: config.renamer.clone(),
            packager: config.packager.clone(),
            linker_script: config.linker_script.clone(),
            include_dir: config.include_dir.clone(),
        }
    }

    /// `<compiler> <includes> <source> -o <object> <flags> <cflags>`
    pub fn compile_command(&self, source: &Path, object: &Path, cflags: &str) -> ToolCommand {
        ToolCommand::new(&self.compiler)
            .arg("-I")
            .path_arg(&self.include_dir)
            .arg("-Wno-unused-function")
            .path_arg(source)
            .arg("-o")
            .path_arg(object)
            .flags(COMPILE_FLAGS)
            .flags(cflags)
    }

    pub fn rename_command(&self, object: &Path) -> ToolCommand {
        ToolCommand::new(&self.renamer).path_arg(object)
    }

    pub fn link_command(&self, objects: &[PathBuf], elf: &Path) -> ToolCommand {
        let mut script = std::ffi::OsString::from("-T");
        script.push(&self.linker_script);

        ToolCommand::new(&self.linker)
            .flags(LINK_FLAGS)
            .arg(script)
            .args(objects.iter().map(|o| o.as_os_str().to_os_string()))
            .arg("-o")
            .path_arg(elf)
    }

    pub fn package_command(&self, binary: &Path, elf: &Path) -> ToolCommand {
        ToolCommand::new(&self.packager)
            .arg("--no-debug")
            .arg("--bin-name")
            .path_arg(binary)
            .path_arg(elf)
    }
}
