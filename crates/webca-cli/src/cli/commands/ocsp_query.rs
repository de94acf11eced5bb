//! `webca ocsp-query` - Ask the OCSP responder about serial numbers.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use webca_crypto::ocsp::{CertId, CertStatus, OcspRequest, OcspResponse};
use webca_crypto::Serial;
use webca_service::OcspResponder;

use super::Context;
use crate::cli::args::OcspQueryArgs;

pub async fn execute(ctx: Context, args: OcspQueryArgs) -> Result<()> {
    let ws = ctx.open().await?;
    let responder = OcspResponder::from_config(ws.repo.clone(), &ws.stores).await?;

    let ids = args
        .serials
        .iter()
        .map(|s| -> Result<CertId> { Ok(CertId::new(responder.issuer(), &Serial::from_hex(s)?)) })
        .collect::<Result<Vec<_>>>()?;
    let mut request = OcspRequest::new(ids);
    if let Some(nonce) = &args.nonce {
        request = request.with_nonce(nonce.as_bytes());
    }
    let der = request.to_der();
    if args.print_request {
        println!("{}", STANDARD.encode(&der));
    }

    let response = OcspResponse::parse(&responder.handle(&der).await)?;
    println!("Response status: {}", response.status);
    for single in response.basic.iter().flat_map(|b| &b.responses) {
        let serial = &single.cert_id.serial;
        match single.status {
            CertStatus::Good => println!("{serial}: good"),
            CertStatus::Revoked { date, reason } => println!(
                "{serial}: revoked {date} ({})",
                reason.map_or("unspecified", |r| r.name())
            ),
            CertStatus::Unknown => println!("{serial}: unknown"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::initialised;

    #[tokio::test]
    async fn test_query_runs_against_snapshot() {
        let (ctx, _dir) = initialised().await;
        let args = OcspQueryArgs {
            serials: vec![String::from("0a1b")],
            nonce: Some(String::from("n1")),
            print_request: true,
        };
        execute(ctx, args).await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_serial_is_an_error() {
        let (ctx, _dir) = initialised().await;
        let args = OcspQueryArgs {
            serials: vec![String::from("not hex")],
            nonce: None,
            print_request: false,
        };
        assert!(execute(ctx, args).await.is_err());
    }
}
