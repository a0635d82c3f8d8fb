fn main() {
    let mut opts = zutube::RunOptions::default();
    if handle_cli_flags(&mut opts) {
        return;
    }

    if let Err(err) = zutube::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags(opts: &mut zutube::RunOptions) -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ZuTube {}", zutube::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "ZuTube: browse and discuss videos from the terminal.\n\nUsage: zutube [OPTIONS] [PAGE]\n\n  PAGE                 Page to open first, e.g. /video/42 or \"/?search=rust\"\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --demo               Run against built-in sample videos\n  --logout             Forget the stored sign-in and exit"
                );
                saw_flag = true;
            }
            "--demo" => opts.demo = true,
            "--logout" => {
                saw_flag = true;
                match zutube::logout() {
                    Ok(true) => println!("Signed out."),
                    Ok(false) => println!("Not signed in."),
                    Err(err) => {
                        eprintln!("Logout failed: {err:?}");
                        std::process::exit(1);
                    }
                }
            }
            page if page.starts_with('/') && opts.start_path.is_none() => {
                opts.start_path = Some(page.to_string());
            }
            other => {
                eprintln!("unknown argument: {other} (see --help)");
                std::process::exit(2);
            }
        }
    }
    saw_flag
}
