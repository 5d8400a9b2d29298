fn main() {
    if let Err(err) = maplabel_rs::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
