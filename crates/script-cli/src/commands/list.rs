use script_executor::Config;

pub fn run(config: &Config) {
    println!("Scripts ({}):", config.scripts.len());

    for (name, script) in &config.scripts {
        if script.args.is_empty() {
            println!("  {:<20} {}", name, script.command);
        } else {
            println!("  {:<20} {} {}", name, script.command, script.args.join(" "));
        }
    }
}
