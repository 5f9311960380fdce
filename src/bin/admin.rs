// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authgate admin tool.
//!
//! Mints credentials, prints public keys and checks a credential against the
//! embedded policies, using the same key directory as the server.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use authgate::auth::{AccessControl, KeyStore, Role, SystemClock};
use authgate::config::{
    ACTIVE_KID_ENV, AUTH_AUDIENCE_ENV, AUTH_ISSUER_ENV, DEFAULT_ACTIVE_KID, DEFAULT_ISSUER,
    DEFAULT_KEYS_DIR, DEFAULT_TOKEN_TTL_SECS, KEYS_DIR_ENV, TOKEN_TTL_SECS_ENV,
};
use authgate::error::StartupError;
use authgate::policy::{AuthzRule, EvalContext, PolicyEngine};

#[derive(Parser)]
#[command(name = "authgate-admin", author, version, about, long_about = None)]
struct Cli {
    /// Directory of PEM private keys
    #[arg(long, global = true, env = KEYS_DIR_ENV, default_value = DEFAULT_KEYS_DIR)]
    keys_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mint a signed credential and print it
    Token {
        /// Subject (user id)
        #[arg(long)]
        sub: String,

        /// Comma-separated roles, e.g. ADMIN,USER
        #[arg(long, value_delimiter = ',')]
        roles: Vec<Role>,

        /// Signing key id
        #[arg(long, env = ACTIVE_KID_ENV, default_value = DEFAULT_ACTIVE_KID)]
        kid: String,

        #[arg(long, env = AUTH_ISSUER_ENV, default_value = DEFAULT_ISSUER)]
        issuer: String,

        #[arg(long, env = AUTH_AUDIENCE_ENV)]
        audience: Option<String>,

        /// Lifetime in seconds
        #[arg(
            long,
            env = TOKEN_TTL_SECS_ENV,
            default_value_t = DEFAULT_TOKEN_TTL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        ttl_secs: u64,
    },

    /// Print the public key of a loaded key as PEM
    PublicKey {
        #[arg(long, env = ACTIVE_KID_ENV, default_value = DEFAULT_ACTIVE_KID)]
        kid: String,
    },

    /// Authenticate a credential and evaluate an authorization rule for it
    Check {
        #[arg(long)]
        token: String,

        /// any, admin-only, user-only or admin-or-subject
        #[arg(long, default_value = "any")]
        rule: AuthzRule,

        #[arg(long, env = AUTH_AUDIENCE_ENV)]
        audience: Option<String>,
    },
}

fn main() -> ExitCode {
    // Stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, StartupError> {
    let keys = Arc::new(KeyStore::from_dir(&cli.keys_dir)?);

    match cli.command {
        Command::Token {
            sub,
            roles,
            kid,
            issuer,
            audience,
            ttl_secs,
        } => {
            let token = access(keys, None)?.issuer().issue_for(
                &kid,
                &sub,
                &issuer,
                audience.as_deref(),
                &roles,
                Duration::from_secs(ttl_secs),
            )?;
            println!("{token}");
            Ok(ExitCode::SUCCESS)
        }

        Command::PublicKey { kid } => {
            print!("{}", keys.public_key_pem(&kid)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Check {
            token,
            rule,
            audience,
        } => {
            let access = access(keys, audience)?;
            let ctx = EvalContext::background();

            let claims = match access.authenticate(&ctx, &token) {
                Ok(claims) => claims,
                Err(e) => {
                    eprintln!("not authenticated: {e}");
                    return Ok(ExitCode::from(2));
                }
            };
            if let Err(e) = access.authorize(&ctx, &claims, rule) {
                eprintln!("not authorized: {e}");
                return Ok(ExitCode::from(3));
            }

            match serde_json::to_string_pretty(&claims) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("claims are not printable: {e}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn access(keys: Arc<KeyStore>, audience: Option<String>) -> Result<AccessControl, StartupError> {
    let policies = Arc::new(PolicyEngine::embedded()?);
    let access = AccessControl::new(keys, policies, Arc::new(SystemClock));
    Ok(match audience {
        Some(audience) => access.with_audience(audience),
        None => access,
    })
}
