fn main() {
    if let Err(err) = forklog::control::fakeshell() {
        eprintln!("fakeshell: {}", err);
        std::process::exit(1);
    }
}
