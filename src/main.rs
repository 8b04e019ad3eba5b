fn main() {
    if let Err(err) = sheetlens::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
