//! `ld` — compile and run LittleDuck programs.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use littleduck::{Compiler, StdPrint, VirtualMachine};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ld", version, about = "LittleDuck compiler and virtual machine")]
struct Args {
    /// Input source file to compile
    input_file: PathBuf,

    /// Dependency source files (modules importable from the input file)
    #[arg(long = "dependencies", num_args = 0.., value_name = "FILE")]
    dependencies: Vec<PathBuf>,

    /// Directory to place the compiled IR file in
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Hide warnings during compilation
    #[arg(short = 'w', long = "no-warnings")]
    no_warnings: bool,

    /// Enable debug output (full trace, plus a JSON IR listing with -o)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug {
        "littleduck=trace"
    } else if args.verbose {
        "littleduck=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    // The runtime program's exit code is printed by the VM; the process
    // exit status only distinguishes success from compile/run failure.
    match run(&args) {
        Ok(_exit_code) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<i64, String> {
    let source = read_file(&args.input_file)?;
    let mut dependency_sources = Vec::with_capacity(args.dependencies.len());
    for path in &args.dependencies {
        dependency_sources.push(read_file(path)?);
    }
    let dependency_refs: Vec<&str> = dependency_sources.iter().map(String::as_str).collect();

    let output = Compiler::compile_with_dependencies(&source, &dependency_refs)
        .map_err(|error| error.to_string())?;

    if !args.no_warnings {
        for warning in &output.warnings {
            eprintln!("{warning}");
        }
    }

    if let Some(directory) = &args.output_dir {
        write_ir(args, directory, &output.code)?;
    }

    VirtualMachine::new(output.code)
        .run(&mut StdPrint)
        .map_err(|error| littleduck::LittleDuckError::from(error).to_string())
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|error| format!("error reading {}: {error}", path.display()))
}

fn write_ir(args: &Args, directory: &Path, code: &littleduck::GeneratedCode) -> Result<(), String> {
    let stem = args
        .input_file
        .file_stem()
        .map_or_else(|| "out".to_owned(), |s| s.to_string_lossy().into_owned());
    fs::create_dir_all(directory)
        .map_err(|error| format!("error creating {}: {error}", directory.display()))?;
    let path = directory.join(format!("{stem}.ldo"));
    let bytes = code.dump().map_err(|error| format!("error serializing IR: {error}"))?;
    fs::write(&path, bytes).map_err(|error| format!("error writing {}: {error}", path.display()))?;
    if args.debug {
        let listing = code.to_json().map_err(|error| format!("error listing IR: {error}"))?;
        let json_path = directory.join(format!("{stem}.json"));
        fs::write(&json_path, listing)
            .map_err(|error| format!("error writing {}: {error}", json_path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn args_parse() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn compiles_and_runs_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let main_path = dir.path().join("hello.ld");
        let mut file = fs::File::create(&main_path).unwrap();
        write!(file, "program Hello; main {{ exit_code = 3; }} end;").unwrap();

        let args = Args::parse_from(["ld", main_path.to_str().unwrap(), "-w"]);
        assert_eq!(run(&args), Ok(3));
    }

    #[test]
    fn writes_ir_files_with_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let main_path = dir.path().join("hello.ld");
        fs::write(&main_path, "program Hello; main { exit_code = 0; } end;").unwrap();
        let out_dir = dir.path().join("out");

        let args = Args::parse_from([
            "ld",
            main_path.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
            "-w",
        ]);
        run(&args).unwrap();

        let ir = fs::read(out_dir.join("hello.ldo")).unwrap();
        let restored = littleduck::GeneratedCode::load(&ir).unwrap();
        assert!(!restored.quadruples.is_empty());
    }

    #[test]
    fn dependencies_flow_through() {
        let dir = tempfile::tempdir().unwrap();
        let dep_path = dir.path().join("mathlib.ld");
        fs::write(
            &dep_path,
            "program MathLib; int double(n:int): { return n + n; } main { } end;",
        )
        .unwrap();
        let main_path = dir.path().join("app.ld");
        fs::write(
            &main_path,
            "import MathLib; program App; main { exit_code = double(4); } end;",
        )
        .unwrap();

        let args = Args::parse_from([
            "ld",
            main_path.to_str().unwrap(),
            "--dependencies",
            dep_path.to_str().unwrap(),
            "-w",
        ]);
        assert_eq!(run(&args), Ok(8));
    }
}
