use colored::*;

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Toolchain not installed
        if output.contains("arm-none-eabi-gcc: not found")
            || output.contains("arm-none-eabi-gcc: command not found")
        {
            return Some(Self::toolchain_hint());
        }

        // 2. Missing linker script
        if output.contains("cannot open linker script file") {
            return Some(format!(
                "The {} could not be found.\nCheck {} in the project file.",
                "linker script".bold().red(),
                "[toolchain] linker_script".bold().yellow()
            ));
        }

        // 3. Missing IEC runtime headers (Compiler Error)
        if output.contains("fatal error: ") && output.contains("No such file or directory") {
            if output.contains("iec_") || output.contains("accessor.h") {
                return Some(format!(
                    "The {} headers were not found.\nPoint {} at the matiec include directory.",
                    "IEC runtime".bold().red(),
                    "[toolchain] include_dir".bold().yellow()
                ));
            }
            return Some(format!(
                "It looks like a {} error.\nRegenerate the IEC sources so every generated header is in the build directory.",
                "Missing Header".bold().red()
            ));
        }

        // 4. Relocation the module loader cannot handle
        if output.contains("relocation truncated to fit") {
            return Some(format!(
                "A {} does not fit the module layout.\nModules must be built with {}; check the per-file cflags.",
                "relocation".bold().red(),
                "-mlong-calls".bold().green()
            ));
        }

        None
    }

    /// Hint for a tool that could not be started at all.
    pub fn missing_program(program: &str) -> String {
        if program.contains("arm-none-eabi") {
            return Self::toolchain_hint();
        }
        format!(
            "'{}' could not be started.\nCheck the {} paths in the project file.",
            program.bold(),
            "[toolchain]".bold().yellow()
        )
    }

    fn toolchain_hint() -> String {
        format!(
            "The {} toolchain is not on PATH.\nInstall the GNU Arm Embedded toolchain or set {} in the project file.",
            "arm-none-eabi".bold().yellow(),
            "[toolchain] compiler".bold().green()
        )
    }
}
