//! Prints an Argon2 PHC string for seeding `usuario.Contrasena` by hand.

use std::process::ExitCode;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};

fn main() -> ExitCode {
    let Some(password) = std::env::args().nth(1) else {
        eprintln!("Usage: hashpass <password>");
        return ExitCode::from(2);
    };
    if password.chars().count() < 8
        || !password.chars().any(char::is_alphabetic)
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        eprintln!("password must be at least 8 characters with a letter and a digit");
        return ExitCode::from(2);
    }

    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(phc) => {
            println!("{phc}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("argon2 hash error: {e}");
            ExitCode::FAILURE
        }
    }
}
