//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Certificate authority: issuance poller, CRL publisher and OCSP responder
///
/// State lives in a JSON snapshot inside the data directory; run
/// `webca init` once before anything else.
#[derive(Parser, Debug)]
#[command(name = "webca")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Service configuration file (TOML)
    #[arg(
        short,
        long,
        env = "WEBCA_CONFIG",
        default_value = "webca.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Data directory, overriding the configuration file
    #[arg(long, env = "WEBCA_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the root CA, CSR and OCSP signing keys
    Init(InitArgs),

    /// Run the issuance poller and the OCSP responder
    Serve,

    /// Regenerate the CRL
    Crl(CrlArgs),

    /// Query certificate status through the OCSP responder
    OcspQuery(OcspQueryArgs),
}

// ============================================================================
// Init command
// ============================================================================

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Root CA subject, e.g. "/C=ES/O=Example/CN=Example Root"
    #[arg(short, long, default_value = "/CN=webca Root CA")]
    pub subject: String,

    /// RSA key size for the generated keys
    #[arg(short, long, default_value = "2048")]
    pub bits: u32,

    /// Root certificate lifetime in days
    #[arg(short, long, default_value = "3650")]
    pub days: u32,

    /// CRL distribution point URL advertised in issued certificates
    #[arg(long)]
    pub crl_url: Vec<String>,

    /// Replace an existing snapshot
    #[arg(long)]
    pub force: bool,
}

// ============================================================================
// CRL command
// ============================================================================

#[derive(Args, Debug)]
pub struct CrlArgs {
    /// Publish even if the current CRL is not due yet
    #[arg(short, long)]
    pub force: bool,
}

// ============================================================================
// OCSP query command
// ============================================================================

#[derive(Args, Debug)]
pub struct OcspQueryArgs {
    /// Certificate serial numbers in hex
    #[arg(required = true)]
    pub serials: Vec<String>,

    /// Nonce to send with the request
    #[arg(long)]
    pub nonce: Option<String>,

    /// Print the base64 request, usable as an HTTP GET path
    #[arg(long)]
    pub print_request: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from([
            "webca",
            "init",
            "--subject",
            "/O=Example/CN=Root",
            "--crl-url",
            "http://ca.example.org/a.crl",
            "--crl-url",
            "http://ca.example.org/b.crl",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("webca.toml"));
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.subject, "/O=Example/CN=Root");
        assert_eq!(args.bits, 2048);
        assert_eq!(args.crl_url.len(), 2);
    }

    #[test]
    fn test_parse_ocsp_query() {
        let cli =
            Cli::try_parse_from(["webca", "--data-dir", "/tmp/ca", "ocsp-query", "0a1b", "ff"])
                .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ca")));
        let Commands::OcspQuery(args) = cli.command else {
            panic!("expected ocsp-query");
        };
        assert_eq!(args.serials, vec!["0a1b", "ff"]);
        assert!(Cli::try_parse_from(["webca", "ocsp-query"]).is_err());
    }
}
