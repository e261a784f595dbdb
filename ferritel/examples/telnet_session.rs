//! Basic example: log into a telnet host and run a few commands
//!
//! # Prerequisites
//!
//! - Telnet server reachable on the target host (port 23)
//! - Valid credentials
//!
//! # Usage
//!
//! ```bash
//! cargo run --example telnet_session -- --host 192.168.1.1 --user admin --password secret
//! ```

use std::env;
use std::time::Duration;

use ferritel::{InteractiveBuilder, RetryPolicy, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG=debug (or trace) for the login exchange and every line
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);

    let session = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .prompt(&args.prompt)
        .timeout(Duration::from_secs(args.timeout))
        .login_timeout(Duration::from_secs(args.timeout))
        .retry(RetryPolicy::exponential(Duration::from_millis(500), 3))
        .strip_ansi(true)
        .connect()
        .await?;
    println!("Logged in!");

    // Shell prompts end without a newline, so mark the end of output
    // with a line of our own
    println!("\nExecuting: uname -a");
    println!("{}", "-".repeat(50));
    session.write("uname -a; echo __done__")?;
    let output = session.expect("^__done__", Duration::from_secs(5))?.outcome().await?;
    if !output.matched {
        eprintln!("Marker not seen within {:?}, partial output:", output.elapsed);
    }
    println!("{}", output.text);
    println!("{}", "-".repeat(50));

    // Queue several expectations at once; they resolve in order
    session.write("pwd")?;
    let pwd = session.expect("^/", Duration::from_secs(5))?;
    session.write("whoami")?;
    let whoami = session.expect(&regex::escape(&args.user), Duration::from_secs(5))?;
    let pwd = pwd.outcome().await?;
    let whoami = whoami.outcome().await?;
    println!("Current directory: {}", pwd.lines().last().unwrap_or_default());
    println!("Running as: {}", whoami.lines().last().unwrap_or_default());

    println!("\nExecuting an interactive sequence");
    let events = InteractiveBuilder::new()
        .send("echo 'Continue?'; read answer; echo \"got $answer\"")
        .expect(r"^Continue\?")?
        .send("yes")
        .expect(r"^got yes")?
        .build();
    let result = session.send_interactive(&events).await?;
    for step in &result.steps {
        println!("  {} -> {}", step.input, if step.failed { "failed" } else { "ok" });
    }

    println!("\nClosing session...");
    session.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    prompt: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 23,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: String::new(),
            prompt: r"[$#>]\s*$".to_string(),
            timeout: 30,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(23),
                ("--user" | "-u", Some(v)) => parsed.user = v,
                ("--password" | "-P", Some(v)) => parsed.password = v,
                ("--prompt", Some(v)) => parsed.prompt = v,
                ("--timeout" | "-t", Some(v)) => parsed.timeout = v.parse().unwrap_or(30),
                ("--help", _) => {
                    Self::print_help();
                    std::process::exit(0);
                }
                (other, _) => {
                    eprintln!("Unknown or incomplete argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"ferritel telnet_session example

USAGE:
    cargo run --example telnet_session -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        Telnet port [default: 23]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password
        --prompt <REGEX>     Shell prompt pattern [default: [$#>]\s*$]
    -t, --timeout <SECS>     Connect and login timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}
