//! CLI tool to create an admin account.
//!
//! Usage:
//!   cargo run --bin create-admin -- --email admin@example.edu --username admin --password <pw>

use std::env;

use uuid::Uuid;

use voice_lecturer_lib::auth::hash_password;
use voice_lecturer_lib::config::Config;
use voice_lecturer_lib::db::DbPool;
use voice_lecturer_lib::models::user::{
    validate_email, validate_password, validate_username, UserRole,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut email: Option<String> = None;
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;
    let mut first_name = "Admin".to_string();
    let mut last_name = "User".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--email" | "-e" => {
                i += 1;
                if i < args.len() {
                    email = Some(args[i].clone());
                }
            }
            "--username" | "-u" => {
                i += 1;
                if i < args.len() {
                    username = Some(args[i].clone());
                }
            }
            "--password" | "-p" => {
                i += 1;
                if i < args.len() {
                    password = Some(args[i].clone());
                }
            }
            "--first-name" => {
                i += 1;
                if i < args.len() {
                    first_name = args[i].clone();
                }
            }
            "--last-name" => {
                i += 1;
                if i < args.len() {
                    last_name = args[i].clone();
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // The password can also come from the environment so it stays out of
    // shell history.
    let password = password.or_else(|| env::var("VCL_ADMIN_PASSWORD").ok());

    let (email, username, password) = match (email, username, password) {
        (Some(e), Some(u), Some(p)) => (e, u, p),
        _ => {
            eprintln!("Error: --email, --username, and --password are required");
            eprintln!("       (the password may also be set via VCL_ADMIN_PASSWORD)");
            print_usage();
            std::process::exit(1);
        }
    };

    for check in [
        validate_email(&email),
        validate_username(&username),
        validate_password(&password),
    ] {
        if let Err(message) = check {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    }

    // Load config and connect
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match DbPool::new(&config).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = pool.run_migrations().await {
        eprintln!("Error running migrations: {}", e);
        std::process::exit(1);
    }

    match pool.user_exists(&email, &username).await {
        Ok(true) => {
            eprintln!("Error: a user with this email or username already exists");
            std::process::exit(1);
        }
        Ok(false) => {}
        Err(e) => {
            eprintln!("Error checking for existing user: {}", e);
            std::process::exit(1);
        }
    }

    let password_hash = hash_password(&password);
    let user = match pool
        .insert_user(
            Uuid::now_v7(),
            &email,
            &username,
            &password_hash,
            &first_name,
            &last_name,
            None,
            None,
            UserRole::Admin,
        )
        .await
    {
        Ok(user) => user,
        Err(e) => {
            eprintln!("Error creating admin user: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!("  Admin Account Created");
    println!("════════════════════════════════════════════════════════════════");
    println!();
    println!("  ID:       {}", user.id);
    println!("  Email:    {}", user.email);
    println!("  Username: {}", user.username);
    println!("  Role:     {}", user.role);
    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!();
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: create-admin --email <email> --username <name> --password <password>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --email, -e     Admin email address (required)");
    eprintln!("  --username, -u  Admin username (required)");
    eprintln!("  --password, -p  Password, or set VCL_ADMIN_PASSWORD (required)");
    eprintln!("  --first-name    Defaults to 'Admin'");
    eprintln!("  --last-name     Defaults to 'User'");
    eprintln!("  --help, -h      Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  create-admin --email admin@example.edu --username admin --password 'S3curePass'");
    eprintln!();
}
