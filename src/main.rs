fn main() {
    let args = std::env::args();

    if let Err(err) = pgwrap::run(args) {
        eprintln!("pgwrap error: {err}");
        std::process::exit(1);
    }
}
