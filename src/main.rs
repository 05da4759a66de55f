fn main() {
    if let Err(err) = tarn::run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
