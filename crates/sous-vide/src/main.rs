mod runtime;

fn main() {
    if let Err(e) = runtime::run_from_args() {
        eprintln!("sous-vide: {e}");
        std::process::exit(1);
    }
}
