use colored::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::clean::remove_intermediates;
use super::feedback::FeedbackAnalyzer;
use super::process::{ToolCommand, ToolOutput, ToolRunner, run_checked};
use super::toolchain::Toolchain;
use crate::codegen::{self, TemplateRepository};
use crate::error::{BuildError, Result};
use crate::hash::file_md5;
use crate::log::BuildLog;
use crate::model::{ProjectModel, SourceUnit};
use crate::store::ArtifactStore;

pub const MAIN_SOURCE: &str = "plc_main.c";
pub const DEBUG_SOURCE: &str = "plc_debugger.c";
pub const HEADER_NAME: &str = "beremiz.h";

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub binary: PathBuf,
    pub hash: String,
    pub compiled: usize,
    pub relinked: bool,
}

/// State of one build invocation. Nothing in here outlives the build
/// except what [`ModuleBuilder::try_build`] hands to the store at the end.
struct BuildSession {
    build_dir: PathBuf,
    binary: PathBuf,
    staged: PathBuf,
    elf: PathBuf,
    relink: bool,
    objects: Vec<PathBuf>,
    used_object_names: HashSet<String>,
    source_digests: Vec<(PathBuf, String)>,
}

impl BuildSession {
    fn new(store: &ArtifactStore) -> Self {
        let binary = store.binary_path();
        Self {
            build_dir: store.build_dir().to_path_buf(),
            relink: !binary.exists(),
            binary,
            staged: store.staged_binary_path(),
            elf: store.elf_path(),
            objects: Vec::new(),
            used_object_names: HashSet::new(),
            source_digests: Vec::new(),
        }
    }

    /// `<build>/<stem>.o`, suffixed when two sources share a stem.
    fn object_path(&mut self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unit".to_string());
        let mut name = format!("{stem}.o");
        let mut n = 1;
        while !self.used_object_names.insert(name.clone()) {
            name = format!("{stem}_{n}.o");
            n += 1;
        }
        self.build_dir.join(name)
    }
}

/// Builds PLC modules for one project context.
pub struct ModuleBuilder<'a> {
    toolchain: Toolchain,
    templates: TemplateRepository,
    store: ArtifactStore,
    runner: Box<dyn ToolRunner + 'a>,
    log: &'a dyn BuildLog,
    verbose: bool,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(
        toolchain: Toolchain,
        templates: TemplateRepository,
        store: ArtifactStore,
        runner: Box<dyn ToolRunner + 'a>,
        log: &'a dyn BuildLog,
    ) -> Self {
        Self {
            toolchain,
            templates,
            store,
            runner,
            log,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ArtifactStore {
        &mut self.store
    }

    /// Run a build, reporting any failure through the logger.
    pub fn build(&mut self, project: &dyn ProjectModel) -> bool {
        match self.try_build(project) {
            Ok(_) => true,
            Err(e) => {
                self.report_failure(&e);
                false
            }
        }
    }

    /// Render, compile, isolate symbols, link, package and hash.
    ///
    /// The binary module and its hash side-car are only replaced once
    /// packaging succeeded; any error before that leaves both as they were.
    pub fn try_build(&mut self, project: &dyn ProjectModel) -> Result<BuildReport> {
        let start_time = Instant::now();

        // 1. Render
        self.write_sources(project)?;

        // 2. Collect compile units
        let mut session = BuildSession::new(&self.store);
        let groups = self.compile_groups(project);

        // 3-4. Compile and isolate symbols, one source at a time
        let mut compiled = 0;
        for (label, units) in &groups {
            self.log.info(&format!("\nCompiling PLC code for: {}", label));
            for unit in units {
                self.compile_unit(&mut session, unit)?;
                compiled += 1;
                session.relink = true;
            }
        }

        // 5-6. Link and package
        let relinked = session.relink;
        if session.relink {
            self.link_and_package(&session)?;
        } else {
            self.log.info(&format!(
                "   [pass]  {} is up to date",
                self.store.binary_name()
            ));
        }

        // 7. Intermediates
        let removed = remove_intermediates(&session.build_dir);
        if self.verbose {
            self.log
                .info(&format!("Removed {} intermediate file(s)", removed));
        }

        // 8. Hash
        let hash = file_md5(&session.binary)?;
        self.store.record_hash(&hash)?;
        self.store.record_source_digests(session.source_digests);
        self.log.info(&format!(
            "\nCalculated MD5 for {} is {}",
            self.store.binary_name(),
            hash
        ));
        self.log.info(&format!(
            "MD5 written to {}",
            self.store.hash_file_path().display()
        ));
        self.log.info(&format!(
            "{} Build finished in {:.2?}",
            "✓".green(),
            start_time.elapsed()
        ));

        Ok(BuildReport {
            binary: session.binary,
            hash,
            compiled,
            relinked,
        })
    }

    /// Write `plc_main.c`, `plc_debugger.c` and the target header into the
    /// build directory.
    pub fn write_sources(&self, project: &dyn ProjectModel) -> Result<()> {
        let build_dir = self.store.build_dir();
        fs::create_dir_all(build_dir).map_err(|e| BuildError::fs(build_dir, e))?;

        let code = codegen::generate(project, &self.templates)?;
        for (name, content) in [(MAIN_SOURCE, &code.main), (DEBUG_SOURCE, &code.debug)] {
            let path = build_dir.join(name);
            fs::write(&path, content).map_err(|e| BuildError::fs(&path, e))?;
        }

        let header = self.templates.header_path();
        fs::copy(&header, build_dir.join(HEADER_NAME)).map_err(|e| BuildError::fs(&header, e))?;
        Ok(())
    }

    /// Sources to compile, grouped by location in project order.
    ///
    /// The rendered main and debug sources come first unless the project
    /// already lists them.
    fn compile_groups(&self, project: &dyn ProjectModel) -> Vec<(String, Vec<SourceUnit>)> {
        let build_dir = self.store.build_dir();
        let listed: HashSet<&Path> = project
            .locations()
            .iter()
            .flat_map(|l| l.sources.iter().map(|u| u.file.as_path()))
            .collect();

        let generated: Vec<SourceUnit> = [MAIN_SOURCE, DEBUG_SOURCE]
            .iter()
            .map(|name| build_dir.join(name))
            .filter(|path| !listed.contains(path.as_path()))
            .map(SourceUnit::new)
            .collect();

        let mut groups = Vec::new();
        if !generated.is_empty() {
            groups.push(("generated code".to_string(), generated));
        }
        for location in project.locations().iter().filter(|l| l.is_compiled()) {
            let units: Vec<SourceUnit> = location
                .sources
                .iter()
                .filter(|u| u.is_c_source())
                .cloned()
                .collect();
            if !units.is_empty() {
                groups.push((location.display_name().to_string(), units));
            }
        }
        groups
    }

    fn compile_unit(&self, session: &mut BuildSession, unit: &SourceUnit) -> Result<()> {
        let file_name = display_name(&unit.file);
        let object = session.object_path(&unit.file);
        self.log.info(&format!(
            "   [CC]  {} -> {}",
            file_name,
            display_name(&object)
        ));

        let digest = file_md5(&unit.file).ok();
        if self.verbose
            && let Some(digest) = &digest
            && self.store.source_digest(&unit.file) == Some(digest.as_str())
        {
            self.log
                .info(&format!("         {} unchanged since last build", file_name));
        }

        let compile = self
            .toolchain
            .compile_command(&unit.file, &object, &unit.cflags);
        self.run_step(&compile, "C compilation", &file_name)?;

        let rename = self.toolchain.rename_command(&object);
        self.run_step(&rename, "Symbol rename", &file_name)?;

        if let Some(digest) = digest {
            session.source_digests.push((unit.file.clone(), digest));
        }
        session.objects.push(object);
        Ok(())
    }

    fn link_and_package(&mut self, session: &BuildSession) -> Result<()> {
        if session.objects.is_empty() {
            return Err(BuildError::NothingToLink);
        }

        let elf_name = display_name(&session.elf);
        let object_names: Vec<String> = session.objects.iter().map(|o| display_name(o)).collect();
        self.log.info(&format!(
            "\nLinking:   [LD]  {} -> {}",
            object_names.join(" "),
            elf_name
        ));
        let link = self.toolchain.link_command(&session.objects, &session.elf);
        self.run_step(&link, "Linking", &elf_name)?;

        let binary_name = self.store.binary_name();
        self.log.info("\nGenerating PLC File:");
        self.log
            .info(&format!("   [UD]  {} -> {}", elf_name, binary_name));
        // A leftover from an interrupted build must never pass for fresh output.
        match fs::remove_file(&session.staged) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::fs(&session.staged, e)),
        }
        let package = self
            .toolchain
            .package_command(&session.staged, &session.elf);
        if let Err(e) = self.run_step(&package, "Packaging", &binary_name) {
            let _ = fs::remove_file(&session.staged);
            return Err(e);
        }
        if !session.staged.is_file() {
            return Err(BuildError::fs(
                &session.staged,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "packager reported success but wrote no module",
                ),
            ));
        }

        // The side-car goes first so it never names a binary that is gone.
        self.store.reset_binary_hash();
        fs::rename(&session.staged, &session.binary)
            .map_err(|e| BuildError::fs(&session.binary, e))?;
        self.log.info(&format!("Output file: {}", binary_name));
        Ok(())
    }

    fn run_step(&self, command: &ToolCommand, tool: &str, subject: &str) -> Result<ToolOutput> {
        if self.verbose {
            self.log.info(&format!("         $ {}", command.display()));
        }
        let output = run_checked(self.runner.as_ref(), command, tool, subject)?;
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            self.log.info(&format!(
                "{} Warning in {}:\n{}",
                "!".yellow(),
                subject,
                stderr
            ));
        }
        Ok(output)
    }

    fn report_failure(&self, error: &BuildError) {
        match error {
            BuildError::Tool { output, .. } => {
                for line in output.lines().filter(|l| !l.trim().is_empty()) {
                    self.log.error(line);
                }
                self.log.error(&format!("{}.", error));
                if let Some(hint) = FeedbackAnalyzer::analyze(output) {
                    self.log.info(&format!("{} {}", "💡".yellow(), hint));
                }
            }
            BuildError::ToolUnavailable { program, .. } => {
                self.log.error(&format!("{}.", error));
                self.log.info(&format!(
                    "{} {}",
                    "💡".yellow(),
                    FeedbackAnalyzer::missing_program(program)
                ));
            }
            _ => self.log.error(&error.to_string()),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
