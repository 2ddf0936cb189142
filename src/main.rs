fn main() {
    if let Err(e) = soundbite_lib::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
