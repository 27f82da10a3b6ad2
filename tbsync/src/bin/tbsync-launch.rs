//! tbsync-launch binary: activate the venv, run the download command from
//! its fixed directory, release the venv. Takes no arguments.

fn main() {
    std::process::exit(tbsync::run_launcher());
}
