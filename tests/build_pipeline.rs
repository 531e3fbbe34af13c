//! Pipeline tests for the module builder.
//!
//! The external ARM tools are replaced by a scripted runner that behaves
//! like a deterministic toolchain: the compiler copies the source into the
//! object, the linker concatenates objects, and the packager copies the ELF
//! image into the module.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use plcmod::build::{self, ModuleBuilder, ProcessRunner, ToolCommand, ToolOutput, ToolRunner};
use plcmod::config::ProjectConfig;
use plcmod::error::BuildError;
use plcmod::hash::bytes_md5;
use plcmod::log::MemoryLog;
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedRunner {
    calls: RefCell<Vec<ToolCommand>>,
    fail: HashSet<&'static str>,
    /// Tools that exit 0 without writing their output file.
    silent: HashSet<&'static str>,
}

impl ScriptedRunner {
    fn failing(tool: &'static str) -> Self {
        Self {
            fail: HashSet::from([tool]),
            ..Self::default()
        }
    }

    fn silent(tool: &'static str) -> Self {
        Self {
            silent: HashSet::from([tool]),
            ..Self::default()
        }
    }

    fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.program_name()).collect()
    }
}

fn arg_after(command: &ToolCommand, flag: &str) -> PathBuf {
    let pos = command
        .args
        .iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("{flag} missing in {}", command.display()));
    PathBuf::from(&command.args[pos + 1])
}

fn exit(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, command: &ToolCommand) -> plcmod::error::Result<ToolOutput> {
        self.calls.borrow_mut().push(command.clone());
        let program = command.program_name();
        if self.fail.contains(program.as_str()) {
            return Ok(exit(1, &format!("{program}: scripted failure")));
        }
        if self.silent.contains(program.as_str()) {
            return Ok(exit(0, ""));
        }

        match program.as_str() {
            "cc" => {
                let source = arg_after(command, "-Wno-unused-function");
                let object = arg_after(command, "-o");
                let text = fs::read_to_string(&source).unwrap();
                if text.contains("#error") {
                    return Ok(exit(1, "POUS.c:1:2: error: #error rejected"));
                }
                fs::write(object, text).unwrap();
            }
            "rename" => {
                let object = PathBuf::from(&command.args[0]);
                assert!(object.exists(), "rename before compile");
            }
            "ld" => {
                let elf = arg_after(command, "-o");
                let mut image = Vec::new();
                for arg in &command.args {
                    let path = Path::new(arg);
                    if path.extension().is_some_and(|e| e == "o") {
                        image.extend(fs::read(path).unwrap());
                    }
                }
                fs::write(elf, image).unwrap();
            }
            "pack" => {
                let binary = arg_after(command, "--bin-name");
                let elf = PathBuf::from(command.args.last().unwrap());
                let mut module = b"MOD1".to_vec();
                module.extend(fs::read(elf).unwrap());
                fs::write(binary, module).unwrap();
            }
            other => panic!("unexpected tool {other}"),
        }
        Ok(exit(0, ""))
    }
}

const DEFAULT_LOCATIONS: &str = r#"
[[location]]
key = "()"
sources = [
    { file = "gen/POUS.c" },
    { file = "gen/POUS.h" },
    { file = "gen/Config0.c" },
    { file = "gen/Res0.c", cflags = "-DRES=0" },
]

[[location]]
key = "0"
callable = true
sources = [{ file = "gen/modbus_0.c" }]

[[location]]
key = "1"
callable = true
sources = [{ file = "gen/modbus_0.c" }]
"#;

/// The rendered sources belong to a callable location, so nothing is
/// compiled and the existing module is kept.
const PREBUILT_LOCATIONS: &str = r#"
[[location]]
key = "()"
sources = [{ file = "gen/POUS.h" }]

[[location]]
key = "rt"
callable = true
sources = [{ file = "build/plc_main.c" }, { file = "build/plc_debugger.c" }]
"#;

struct Fixture {
    dir: TempDir,
    config: ProjectConfig,
}

impl Fixture {
    fn new() -> Self {
        Self::create("", DEFAULT_LOCATIONS)
    }

    fn with_extra(extra_project_keys: &str) -> Self {
        Self::create(extra_project_keys, DEFAULT_LOCATIONS)
    }

    fn with_locations(locations: &str) -> Self {
        Self::create("", locations)
    }

    fn create(extra_project_keys: &str, locations: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let gen_dir = dir.path().join("gen");
        fs::create_dir_all(&gen_dir).unwrap();
        fs::write(gen_dir.join("POUS.c"), "int pous;\n").unwrap();
        fs::write(gen_dir.join("Config0.c"), "int config0;\n").unwrap();
        fs::write(gen_dir.join("Res0.c"), "int res0;\n").unwrap();
        fs::write(gen_dir.join("POUS.h"), "/* header */\n").unwrap();
        fs::write(gen_dir.join("modbus_0.c"), "int modbus;\n").unwrap();

        let templates = Path::new(env!("CARGO_MANIFEST_DIR")).join("targets");
        let toml = format!(
            r#"
[project]
name = "blinky"
target = "PLCF407VE"
build_dir = "build"
{extra_project_keys}

[toolchain]
compiler = "cc"
linker = "ld"
renamer = "rename"
packager = "pack"
templates = "{templates}"

{locations}

[[program]]
type = "MAIN"
path = "RES0__INSTANCE0"

[[variable]]
path = "RES0__INSTANCE0.START"
category = "IN"
type = "BOOL"

[[variable]]
path = "RES0__INSTANCE0.COUNT"
category = "MEM"
type = "INT"
retain = true

[[variable]]
path = "RES0__TON0"
category = "FB"
type = "TON"

[[variable]]
path = "CONFIG0__SPEED"
category = "VAR"
type = "REAL"
retain = true
"#,
            templates = templates.display().to_string().replace('\\', "/"),
        );
        let mut config = ProjectConfig::parse(&toml).unwrap();
        config.resolve_paths(dir.path());
        Self { dir, config }
    }

    fn build_dir(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    fn binary(&self) -> PathBuf {
        self.build_dir().join("blinky.bin")
    }

    fn side_car(&self) -> PathBuf {
        self.build_dir().join("lastbuildPLC.md5")
    }

    fn builder<'a>(&self, runner: &'a ScriptedRunner, log: &'a MemoryLog) -> ModuleBuilder<'a> {
        build::builder_for(&self.config, Box::new(runner), log)
    }
}

#[test]
fn test_successful_build_produces_module_and_hash() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();

    let report = fx.builder(&runner, &log).try_build(&fx.config).unwrap();

    let module = fs::read(fx.binary()).unwrap();
    assert!(module.starts_with(b"MOD1"));
    assert_eq!(report.binary, fx.binary());
    assert_eq!(report.hash, bytes_md5(&module));
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), report.hash);
    assert!(report.relinked);
    // plc_main.c, plc_debugger.c and the three plc code sources
    assert_eq!(report.compiled, 5);

    assert!(fx.build_dir().join("plc_main.c").exists());
    assert!(fx.build_dir().join("plc_debugger.c").exists());
    assert!(fx.build_dir().join("beremiz.h").exists());
    assert!(!fx.build_dir().join("POUS.o").exists());
    assert!(!fx.build_dir().join("blinky.elf").exists());
    assert!(!fx.build_dir().join("blinky.bin.tmp").exists());
    assert!(log.errors().is_empty());
}

#[test]
fn test_rendered_sources_follow_location_order() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    fx.builder(&runner, &log).write_sources(&fx.config).unwrap();

    let main = fs::read_to_string(fx.build_dir().join("plc_main.c")).unwrap();
    assert!(main.contains(
        "init_level=1; if((res = __init_0(argc,argv))) { return res; }\n    \
         init_level=2; if((res = __init_1(argc,argv))) { return res; }"
    ));
    assert!(main.contains("if(init_level >= 2) __cleanup_1();\n    if(init_level >= 1) __cleanup_0();"));
    assert!(main.contains("__publish_1();\n    __publish_0();"));
    assert!(!main.contains("%("));

    let debug = fs::read_to_string(fx.build_dir().join("plc_debugger.c")).unwrap();
    assert!(debug.contains("extern MAIN RES0__INSTANCE0;"));
    assert!(debug.contains("extern       TON   RES0__TON0;"));
    assert!(debug.contains("extern __IEC_REAL_t CONFIG0__SPEED;"));
    assert!(debug.contains(
        "{&(RES0__INSTANCE0.START), BOOL_P_ENUM},\n\
         {&(RES0__INSTANCE0.COUNT), INT_O_ENUM},\n\
         {&(CONFIG0__SPEED), REAL_ENUM}"
    ));
    assert!(debug.contains("/* RES0__INSTANCE0.COUNT */ 1,\n/* CONFIG0__SPEED */ 2"));
    assert!(debug.contains("\tptr[2] = dbgvardsc[2].ptr;"));
    assert!(!debug.contains("ptr[3]"));
    assert!(debug.contains("static int UnpackVar"));
}

#[test]
fn test_each_compile_is_followed_by_its_rename() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    fx.builder(&runner, &log).try_build(&fx.config).unwrap();

    assert_eq!(
        runner.programs(),
        vec![
            "cc", "rename", "cc", "rename", "cc", "rename", "cc", "rename", "cc", "rename", "ld",
            "pack"
        ]
    );

    let calls = runner.calls.borrow();
    let compiled: Vec<String> = calls
        .iter()
        .filter(|c| c.program_name() == "cc")
        .map(|c| {
            arg_after(c, "-Wno-unused-function")
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    assert_eq!(
        compiled,
        vec!["plc_main.c", "plc_debugger.c", "POUS.c", "Config0.c", "Res0.c"]
    );
    assert!(calls[8].display().ends_with("-DRES=0"));
    assert!(!calls.iter().any(|c| c.display().contains("modbus_0")));
}

#[test]
fn test_second_build_is_byte_identical() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    let mut builder = fx.builder(&runner, &log);

    let first = builder.try_build(&fx.config).unwrap();
    let first_bytes = fs::read(fx.binary()).unwrap();
    let second = builder.try_build(&fx.config).unwrap();

    assert_eq!(fs::read(fx.binary()).unwrap(), first_bytes);
    assert_eq!(first.hash, second.hash);
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), first.hash);
    assert_eq!(second.compiled, first.compiled);
}

#[test]
fn test_failed_compile_keeps_previous_module() {
    let fx = Fixture::new();
    let log = MemoryLog::new();
    let runner = ScriptedRunner::default();
    fx.builder(&runner, &log).try_build(&fx.config).unwrap();
    let old_module = fs::read(fx.binary()).unwrap();
    let old_hash = fs::read_to_string(fx.side_car()).unwrap();

    fs::write(fx.dir.path().join("gen/POUS.c"), "#error broken\n").unwrap();
    let runner = ScriptedRunner::default();
    let ok = fx.builder(&runner, &log).build(&fx.config);

    assert!(!ok);
    assert_eq!(fs::read(fx.binary()).unwrap(), old_module);
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), old_hash);
    assert!(log.errors().iter().any(|e| e == "C compilation of POUS.c failed."));
    assert!(log.errors().iter().any(|e| e.contains("#error rejected")));
    assert!(!runner.programs().contains(&"ld".to_string()));
}

#[test]
fn test_failed_rename_aborts_before_link() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::failing("rename");
    let log = MemoryLog::new();

    let err = fx.builder(&runner, &log).try_build(&fx.config).unwrap_err();
    match err {
        BuildError::Tool { tool, subject, .. } => {
            assert_eq!(tool, "Symbol rename");
            assert_eq!(subject, "plc_main.c");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.programs(), vec!["cc", "rename"]);
    assert!(!fx.binary().exists());
    assert!(!fx.side_car().exists());
}

#[test]
fn test_failed_link_keeps_previous_module() {
    let fx = Fixture::new();
    let log = MemoryLog::new();
    let runner = ScriptedRunner::default();
    fx.builder(&runner, &log).try_build(&fx.config).unwrap();
    let old_module = fs::read(fx.binary()).unwrap();

    let runner = ScriptedRunner::failing("ld");
    assert!(!fx.builder(&runner, &log).build(&fx.config));
    assert_eq!(fs::read(fx.binary()).unwrap(), old_module);
    assert!(fx.side_car().exists());
    assert!(log.contains("Linking of blinky.elf failed."));
    assert!(!runner.programs().contains(&"pack".to_string()));
}

#[test]
fn test_failed_package_keeps_previous_module() {
    let fx = Fixture::new();
    let log = MemoryLog::new();
    let runner = ScriptedRunner::default();
    fx.builder(&runner, &log).try_build(&fx.config).unwrap();
    let old_module = fs::read(fx.binary()).unwrap();
    let old_hash = fs::read_to_string(fx.side_car()).unwrap();

    let runner = ScriptedRunner::failing("pack");
    assert!(!fx.builder(&runner, &log).build(&fx.config));
    assert_eq!(fs::read(fx.binary()).unwrap(), old_module);
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), old_hash);
    assert!(!fx.build_dir().join("blinky.bin.tmp").exists());
}

#[test]
fn test_missing_template_aborts_before_compiling() {
    let mut fx = Fixture::new();
    fx.config.project.target = "NO_SUCH_TARGET".to_string();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();

    assert!(!fx.builder(&runner, &log).build(&fx.config));
    assert!(runner.programs().is_empty());
    assert!(log.errors().iter().any(|e| e.contains("NO_SUCH_TARGET_main.c")));
}

#[test]
fn test_extraction_failure_writes_nothing() {
    let fx = Fixture::with_extra(r#"inventory = "gen/missing_inventory.json""#);
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();

    let err = fx.builder(&runner, &log).try_build(&fx.config).unwrap_err();
    assert!(matches!(err, BuildError::Extraction(_)));
    assert!(!fx.build_dir().join("plc_main.c").exists());
    assert!(!fx.build_dir().join("plc_debugger.c").exists());
    assert!(runner.programs().is_empty());
}

#[test]
fn test_inventory_file_replaces_inline_lists() {
    let fx = Fixture::with_extra(r#"inventory = "gen/inventory.json""#);
    fs::write(
        fx.dir.path().join("gen/inventory.json"),
        r#"{"programs": [{"type": "PUMP", "path": "RES1__P"}],
            "variables": [{"path": "RES1__P.ON", "category": "OUT", "type": "BOOL", "retain": true}]}"#,
    )
    .unwrap();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    fx.builder(&runner, &log).write_sources(&fx.config).unwrap();

    let debug = fs::read_to_string(fx.build_dir().join("plc_debugger.c")).unwrap();
    assert!(debug.contains("extern PUMP RES1__P;"));
    assert!(debug.contains("{&(RES1__P.ON), BOOL_O_ENUM}"));
    assert!(!debug.contains("RES0__INSTANCE0"));
}

#[test]
fn test_disabled_extensions_render_minimal_main() {
    let fx = Fixture::with_extra("disable_extensions = true");
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    fx.builder(&runner, &log).write_sources(&fx.config).unwrap();

    let main = fs::read_to_string(fx.build_dir().join("plc_main.c")).unwrap();
    assert!(!main.contains("__init_0"));
    assert!(!main.contains("init_level=1"));
    assert!(main.contains("config_init__();"));
}

#[test]
fn test_reset_hash_reports_unknown_until_next_build() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    let mut builder = fx.builder(&runner, &log);
    let report = builder.try_build(&fx.config).unwrap();
    assert_eq!(builder.store().binary_hash().as_deref(), Some(report.hash.as_str()));

    builder.store_mut().reset_binary_hash();
    assert_eq!(builder.store().binary_hash(), None);
    assert_eq!(build::store_for(&fx.config).binary_hash(), None);
    assert!(fx.binary().exists());

    let again = builder.try_build(&fx.config).unwrap();
    assert_eq!(build::store_for(&fx.config).binary_hash(), Some(again.hash));
}

#[test]
fn test_source_digests_recorded_but_never_skip_compiles() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    let mut builder = fx.builder(&runner, &log).verbose(true);

    builder.try_build(&fx.config).unwrap();
    let pous = fx.dir.path().join("gen/POUS.c");
    assert_eq!(
        builder.store().source_digest(&pous),
        Some(bytes_md5(b"int pous;\n").as_str())
    );

    let second = builder.try_build(&fx.config).unwrap();
    assert_eq!(second.compiled, 5);
    assert!(log.contains("POUS.c unchanged since last build"));
}

#[test]
fn test_new_build_dir_starts_clean() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    let mut builder = fx.builder(&runner, &log);
    builder.try_build(&fx.config).unwrap();
    assert!(builder.store().source_digest_count() > 0);

    let other = fx.dir.path().join("other_build");
    builder.store_mut().set_build_dir(&other);
    assert_eq!(builder.store().binary_hash(), None);
    assert_eq!(builder.store().source_digest_count(), 0);
    assert_eq!(builder.store().binary_path(), other.join("blinky.bin"));
}

#[test]
fn test_stale_staged_module_is_never_installed() {
    let fx = Fixture::new();
    let log = MemoryLog::new();
    let runner = ScriptedRunner::default();
    fx.builder(&runner, &log).try_build(&fx.config).unwrap();
    let old_module = fs::read(fx.binary()).unwrap();
    let old_hash = fs::read_to_string(fx.side_car()).unwrap();

    let staged = fx.build_dir().join("blinky.bin.tmp");
    fs::write(&staged, "STALE-LEFTOVER").unwrap();
    let runner = ScriptedRunner::silent("pack");
    let err = fx.builder(&runner, &log).try_build(&fx.config).unwrap_err();

    assert!(matches!(err, BuildError::Filesystem { .. }));
    assert_eq!(fs::read(fx.binary()).unwrap(), old_module);
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), old_hash);
    assert!(!staged.exists());
}

#[test]
fn test_missing_compiler_names_source_and_hints() {
    let mut fx = Fixture::new();
    fx.config.toolchain.compiler = fx.dir.path().join("toolchain/bin/arm-none-eabi-gcc");
    let log = MemoryLog::new();

    let ok = build::builder_for(&fx.config, Box::new(ProcessRunner), &log).build(&fx.config);

    assert!(!ok);
    let errors = log.errors();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with("C compilation of plc_main.c failed: cannot start"),
        "error: {}",
        errors[0]
    );
    assert!(errors[0].contains("arm-none-eabi-gcc"));
    assert!(log.contains("not on PATH"));
    assert!(!fx.binary().exists());
}

#[test]
fn test_nothing_compiled_keeps_existing_module() {
    let fx = Fixture::with_locations(PREBUILT_LOCATIONS);
    fs::create_dir_all(fx.build_dir()).unwrap();
    fs::write(fx.binary(), "EXISTING-MODULE").unwrap();
    fs::write(fx.side_car(), "stale").unwrap();
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();
    let mut builder = fx.builder(&runner, &log);

    let report = builder.try_build(&fx.config).unwrap();

    assert!(runner.programs().is_empty());
    assert_eq!(report.compiled, 0);
    assert!(!report.relinked);
    assert_eq!(fs::read(fx.binary()).unwrap(), b"EXISTING-MODULE");
    let expected = bytes_md5(b"EXISTING-MODULE");
    assert_eq!(report.hash, expected);
    assert_eq!(fs::read_to_string(fx.side_car()).unwrap(), expected);
    assert!(log.contains("[pass]  blinky.bin is up to date"));

    let again = builder.try_build(&fx.config).unwrap();
    assert_eq!(again.hash, expected);
    assert!(runner.programs().is_empty());
}

#[test]
fn test_nothing_to_link_without_existing_module() {
    let fx = Fixture::with_locations(PREBUILT_LOCATIONS);
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();

    let err = fx.builder(&runner, &log).try_build(&fx.config).unwrap_err();
    assert!(matches!(err, BuildError::NothingToLink));
    assert!(runner.programs().is_empty());
    assert!(!fx.side_car().exists());
}

#[test]
fn test_callable_location_key_must_be_c_identifier() {
    let fx = Fixture::with_locations(
        r#"
[[location]]
key = "()"
callable = true
sources = [{ file = "gen/modbus_0.c" }]
"#,
    );
    let runner = ScriptedRunner::default();
    let log = MemoryLog::new();

    let err = fx.builder(&runner, &log).try_build(&fx.config).unwrap_err();
    assert!(matches!(err, BuildError::Extraction(_)));
    assert!(!fx.build_dir().join("plc_main.c").exists());
    assert!(runner.programs().is_empty());
}
