use std::process::ExitCode;

use ark_std::{end_timer, start_timer};
use clap::Parser;
use rayon::prelude::*;
use silent_threshold::{
    api::SecureRng,
    decryption::{decrypt, partial_decrypt, PartialDecryption, Selector},
    encoding::Encode,
    encryption::encrypt,
    generate_key, AggregateKey, Params, SteError,
};
use tracing::{error, info};

type E = ark_bls12_381::Bls12_381;

#[derive(Parser, Debug)]
#[command(
    about = "Run silent threshold encryption end to end on one machine",
    author,
    version
)]
struct Cli {
    /// Number of committee members
    #[arg(long = "parties", default_value_t = 7)]
    parties: usize,

    /// Decryption threshold (between 1 and parties)
    #[arg(long = "threshold", default_value_t = 4)]
    threshold: usize,

    /// Committee indices that release a share (defaults to the first `threshold`)
    #[arg(long = "responders", value_delimiter = ',')]
    responders: Vec<usize>,

    /// Message to encrypt
    #[arg(long = "message", default_value = "hello")]
    message: String,
}

fn run(cli: &Cli) -> Result<(), SteError> {
    let mut rng = SecureRng::new();

    let params = Params::<E>::new(cli.parties, &mut rng)?;
    info!(
        parties = cli.parties,
        domain_size = params.domain_size(),
        "parameters ready"
    );

    let keygen_timer = start_timer!(|| format!("Key generation for {} parties", cli.parties));
    let keys = (0..cli.parties)
        .map(|i| generate_key(&params, i, &mut rng))
        .collect::<Result<Vec<_>, _>>()?;
    end_timer!(keygen_timer);

    let pks: Vec<_> = keys.iter().map(|(_, pk)| pk.clone()).collect();
    let agg_key = AggregateKey::new(&pks, &params)?;

    let ct = encrypt(&agg_key, cli.threshold, &params, cli.message.as_bytes(), &mut rng)?;
    let ct_bytes = ct.to_bytes()?;
    info!(
        bytes = ct_bytes.len(),
        header = %hex::encode(&ct.header_bytes()?[..16]),
        "encrypted message"
    );

    let responders: Vec<usize> = if cli.responders.is_empty() {
        (0..cli.threshold.min(cli.parties)).collect()
    } else {
        cli.responders.clone()
    };

    let partials = responders
        .par_iter()
        .map(|&i| {
            let (sk, _) = keys.get(i).ok_or(SteError::IndexMismatch(i))?;
            partial_decrypt(sk, i, &ct)
        })
        .collect::<Result<Vec<PartialDecryption<E>>, _>>()?;
    info!(shares = partials.len(), "collected partial decryptions");

    let selector = Selector::from_indices(&ct.committee, &responders)?;
    let decrypt_timer = start_timer!(|| "Decryption");
    let plaintext = decrypt(&partials, &selector, &ct, &agg_key, &params)?;
    end_timer!(decrypt_timer);

    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .try_init();
    });
}
