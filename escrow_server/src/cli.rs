use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 26] = [
        "RUST_LOG",
        "ESCROW_HOST",
        "ESCROW_PORT",
        "ESCROW_DATABASE_URL",
        "ESCROW_AUTO_MIGRATE",
        "ESCROW_USE_X_FORWARDED_FOR",
        "ESCROW_USE_FORWARDED",
        "ESCROW_FRONTEND_URL",
        "ESCROW_BACKEND_URL",
        "ESCROW_PLATFORM_FEE_PERCENT",
        "ESCROW_DELIVERY_SLA_DAYS",
        "ESCROW_OVERDUE_THRESHOLD_DAYS",
        "ESCROW_REFUND_GRACE_DAYS",
        "ESCROW_DISPUTE_EXTENSION_DAYS",
        "ESCROW_OVERDUE_SWEEP_INTERVAL_MINS",
        "ESCROW_REFUND_SWEEP_TIME",
        "ESCROW_FUNDS_SERVICE_URL",
        "ESCROW_SHIPPING_HMAC_HEADER",
        "ESCROW_SHIPPING_HMAC_CHECKS",
        "ESCROW_PAYFAST_MERCHANT_ID",
        "ESCROW_PAYFAST_SANDBOX",
        "ESCROW_OZOW_SITE_CODE",
        "ESCROW_OZOW_TEST_MODE",
        "ESCROW_PAYGATE_ID",
        "ESCROW_EFT_BANK_NAME",
        "ESCROW_EFT_BRANCH_CODE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
