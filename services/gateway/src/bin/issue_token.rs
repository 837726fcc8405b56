//! services/gateway/src/bin/issue_token.rs
//!
//! Mints a bearer token for local development, signed with `JWT_SECRET`.

use chrono::{Duration, Utc};
use clap::Parser;
use gateway_lib::web::auth::CredentialVerifier;
use study_gateway_core::SubjectId;

#[derive(Parser, Debug)]
#[command(name = "issue-token", about = "Mint a development bearer token for the study gateway")]
struct Args {
    /// Subject (student id) to embed in the token.
    subject: String,

    /// Lifetime of the token in seconds.
    #[arg(default_value_t = 3600)]
    ttl_seconds: i64,

    /// Signing secret; defaults to the gateway's JWT_SECRET.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    secret: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let subject = SubjectId::new(&args.subject).ok_or("subject must not be blank")?;
    if args.ttl_seconds <= 0 {
        return Err("ttl-seconds must be positive".into());
    }

    let ttl = Duration::try_seconds(args.ttl_seconds).ok_or("ttl-seconds is too large")?;
    let token = CredentialVerifier::new(&args.secret).issue(&subject, ttl, Utc::now())?;

    println!("Use this value for the Authorization header:");
    println!("Bearer {token}");
    Ok(())
}
