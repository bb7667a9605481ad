fn is_json_mode_args() -> bool {
    std::env::args().any(|arg| arg == "--json")
}

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = match smart_bi_engine::parse_cli(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) if err.code == 0 => {
            // --help / --version
            print!("{}", err.message);
            return Ok(());
        }
        Err(err) => {
            err.emit(is_json_mode_args());
            std::process::exit(err.code);
        }
    };

    let json = cli.wants_json();
    match smart_bi_engine::run_cli(cli) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(err) => {
            err.emit(json);
            std::process::exit(err.code);
        }
    }
}
