//! CLI for issuing selective-disclosure credentials and proving them with the JWT circuit.
//!
//! Usage examples:
//!   cargo run --release -- issue --name denkeni --birthday 0750101 --out issued.json
//!   cargo run --release -- inputs --record issued.json --out inputs.json
//!   cargo run --release -- prove --input inputs.json --out proof.json
//!   cargo run --release -- verify --proof proof.json
//!
//! Circuit artifacts and the prover binary are configured through `ZKVC_*`
//! environment variables (a `.env` file is honoured).

use std::{
    env::args,
    error::Error as _,
    fs,
    path::{Path, PathBuf},
    process,
    time::Instant,
};

use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zkvc_jwt::{
    credential::{claim, format_claims_input, parse_claims_input},
    generate_jwt_inputs, jwt_field_defs, parse_inputs, verify_token, AssetFetcher, Error,
    Es256KeyPair, IssuedCredential, PayloadBuilder, ProofOutput, ProofService, PublicKeyMaterial,
    Result, Settings, SnarkjsProver, TokenSigner,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Issue,
    Inputs,
    VerifyToken,
    Prove,
    Verify,
}

#[derive(Debug, Default, Clone)]
struct CommandOptions {
    input: Option<PathBuf>,
    record: Option<PathBuf>,
    proof: Option<PathBuf>,
    out: Option<PathBuf>,
    name: Option<String>,
    birthday: Option<String>,
}

#[derive(Debug, Clone)]
struct ParsedCommand {
    action: Action,
    options: CommandOptions,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = args().collect();
    let command_args: &[String] = if args.len() > 1 { &args[1..] } else { &[] };

    let command = match parse_command(command_args) {
        Ok(cmd) => cmd,
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            process::exit(1);
        }
    };

    if let Err(err) = execute(command).await {
        eprintln!("Error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

async fn execute(command: ParsedCommand) -> Result<()> {
    let settings = Settings::from_env()?;
    let options = command.options;

    match command.action {
        Action::Issue => {
            let issued = issue(options.name, options.birthday)?;
            emit(options.out.as_ref(), &serde_json::to_string_pretty(&issued)?)?;
        }
        Action::Inputs => {
            let issued = read_record(required(&options.record, "--record")?)?;
            let claims = parse_claims_input(&issued.claims_input)?;
            let key = PublicKeyMaterial::Jwk(issued.public_jwk);

            let t0 = Instant::now();
            let inputs = generate_jwt_inputs(&settings.params, &issued.token, &key, &claims)?;
            let inputs_ms = t0.elapsed().as_millis();
            info!(elapsed_ms = inputs_ms, disclosed = claims.len(), "Circuit inputs generated");

            emit(options.out.as_ref(), &serde_json::to_string_pretty(&inputs)?)?;
        }
        Action::VerifyToken => {
            let issued = read_record(required(&options.record, "--record")?)?;
            let valid = verify_token(&issued.token, &PublicKeyMaterial::Jwk(issued.public_jwk))?;
            println!("token signature valid: {valid}");
            if !valid {
                process::exit(2);
            }
        }
        Action::Prove => {
            let path = required(&options.input, "--input")?;
            let json: serde_json::Value = serde_json::from_slice(&fs::read(path)?)?;
            let inputs = parse_inputs(&json, &jwt_field_defs(&settings.params))?;

            info!(input = %path.display(), "Proving JWT circuit with Groth16");
            let output = proof_service(&settings)?.generate_proof(inputs).await?;
            emit(options.out.as_ref(), &serde_json::to_string_pretty(&output)?)?;
        }
        Action::Verify => {
            let path = required(&options.proof, "--proof")?;
            let output: ProofOutput = serde_json::from_slice(&fs::read(path)?)?;

            info!(proof = %path.display(), "Verifying Groth16 proof");
            let valid = proof_service(&settings)?
                .verify_proof(&output.proof, &output.public_signals)
                .await?;
            println!("proof valid: {valid}");
            if !valid {
                process::exit(2);
            }
        }
    }
    Ok(())
}

/// Generate an issuer key and a credential over `name` and `roc_birthday`.
fn issue(name: Option<String>, birthday: Option<String>) -> Result<IssuedCredential> {
    let mut rng = StdRng::from_entropy();
    let name = name.unwrap_or_else(|| claim::random_name(&mut rng));
    let birthday = birthday.unwrap_or_else(|| claim::random_roc_birthday(&mut rng));

    let issuer = Es256KeyPair::generate()?;
    let issued = PayloadBuilder::new(rng).build(
        issuer.public_jwk(),
        &[("name", name.as_str()), ("roc_birthday", birthday.as_str())],
    );
    let token = issuer.signer().sign(&issued.payload)?;
    info!(claims = issued.claims.len(), "Credential issued");

    Ok(IssuedCredential {
        claims_input: format_claims_input(&issued.claims),
        token,
        public_jwk: issuer.public_jwk().clone(),
    })
}

fn proof_service(settings: &Settings) -> Result<ProofService<SnarkjsProver>> {
    let prover = match &settings.snarkjs {
        Some(command) => SnarkjsProver::from_command_line(command),
        None => SnarkjsProver::default(),
    };
    let fetcher = AssetFetcher::new(&settings.fetch)?;
    Ok(ProofService::new(prover, fetcher, settings.assets.clone()))
}

fn read_record(path: &Path) -> Result<IssuedCredential> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

fn required<'a>(value: &'a Option<PathBuf>, flag: &str) -> Result<&'a PathBuf> {
    value
        .as_ref()
        .ok_or_else(|| Error::InvalidParams(format!("missing required option {flag}")))
}

fn emit(out: Option<&PathBuf>, contents: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, contents)?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{contents}"),
    }
    Ok(())
}

fn parse_command(args: &[String]) -> std::result::Result<ParsedCommand, String> {
    if args.is_empty() {
        return Err("No command provided".into());
    }

    let action = match args[0].as_str() {
        "-h" | "--help" => {
            print_usage();
            process::exit(0);
        }
        "issue" => Action::Issue,
        "inputs" => Action::Inputs,
        "verify-token" => Action::VerifyToken,
        "prove" => Action::Prove,
        "verify" => Action::Verify,
        other => return Err(format!("Unknown command '{other}'")),
    };
    let options = parse_options(&args[1..])?;
    ensure_allowed(action, &options)?;

    Ok(ParsedCommand { action, options })
}

fn ensure_allowed(action: Action, options: &CommandOptions) -> std::result::Result<(), String> {
    let allowed: &[&str] = match action {
        Action::Issue => &["--name", "--birthday", "--out"],
        Action::Inputs => &["--record", "--out"],
        Action::VerifyToken => &["--record"],
        Action::Prove => &["--input", "--out"],
        Action::Verify => &["--proof"],
    };
    let present = [
        ("--input", options.input.is_some()),
        ("--record", options.record.is_some()),
        ("--proof", options.proof.is_some()),
        ("--out", options.out.is_some()),
        ("--name", options.name.is_some()),
        ("--birthday", options.birthday.is_some()),
    ];
    match present
        .iter()
        .find(|(flag, set)| *set && !allowed.contains(flag))
    {
        Some((flag, _)) => Err(format!("Option {flag} is not accepted by {action:?}")),
        None => Ok(()),
    }
}

fn parse_options(args: &[String]) -> std::result::Result<CommandOptions, String> {
    let mut options = CommandOptions::default();
    let mut index = 0;

    while index < args.len() {
        let arg = &args[index];
        if arg == "--help" || arg == "-h" {
            print_usage();
            process::exit(0);
        }

        let (flag, value) = match arg.split_once('=') {
            Some((flag, value)) => (flag, value.to_string()),
            None => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| format!("Missing value for {arg}"))?;
                (arg.as_str(), value.clone())
            }
        };
        if value.is_empty() {
            return Err(format!("Missing value for {flag}"));
        }

        match flag {
            "--input" | "-i" => options.input = Some(PathBuf::from(value)),
            "--record" | "-r" => options.record = Some(PathBuf::from(value)),
            "--proof" | "-p" => options.proof = Some(PathBuf::from(value)),
            "--out" | "-o" => options.out = Some(PathBuf::from(value)),
            "--name" => options.name = Some(value),
            "--birthday" => options.birthday = Some(value),
            _ => return Err(format!("Unknown option '{arg}'")),
        }
        index += 1;
    }

    Ok(options)
}

fn print_usage() {
    eprintln!(
        "Usage:
  zkvc-jwt <command> [options]

Commands:
  issue          Issue a credential over name and roc_birthday with a fresh ES256 key
  inputs         Build circuit inputs from an issued credential record
  verify-token   Check the ES256 signature of an issued credential record
  prove          Generate a Groth16 proof from circuit inputs
  verify         Verify a Groth16 proof

Options:
  --name <value>           Name claim (issue; random if omitted)
  --birthday <YYYMMDD>     ROC birthday claim (issue; random if omitted)
  --record, -r <path>      Issued credential record (inputs/verify-token)
  --input, -i <path>       Circuit input JSON (prove)
  --proof, -p <path>       Proof JSON with public signals (verify)
  --out, -o <path>         Write the result to a file instead of stdout

Environment:
  ZKVC_PROGRAM, ZKVC_PROVING_KEY, ZKVC_VERIFICATION_KEY   Artifact URL, content address or path
  ZKVC_GATEWAYS            Comma-separated IPFS gateway prefixes, tried in order
  ZKVC_FETCH_TIMEOUT_SECS  Per-attempt download timeout (default 30)
  ZKVC_SNARKJS             snarkjs command, e.g. `npx snarkjs` (default `snarkjs`)
  RUST_LOG                 Log filter, e.g. `info`

Examples:
  cargo run --release -- issue --out issued.json
  cargo run --release -- inputs -r issued.json -o inputs.json
  cargo run --release -- prove -i inputs.json -o proof.json
  cargo run --release -- verify -p proof.json"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands_and_options() {
        let cmd = parse_command(&args(&["inputs", "--record", "a.json", "-o=b.json"])).unwrap();
        assert_eq!(cmd.action, Action::Inputs);
        assert_eq!(cmd.options.record, Some(PathBuf::from("a.json")));
        assert_eq!(cmd.options.out, Some(PathBuf::from("b.json")));

        let cmd = parse_command(&args(&["issue", "--name", "denkeni"])).unwrap();
        assert_eq!(cmd.options.name.as_deref(), Some("denkeni"));
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_command(&[]).is_err());
        assert!(parse_command(&args(&["reblind"])).is_err());
        assert!(parse_command(&args(&["prove", "--input"])).is_err());
        assert!(parse_command(&args(&["verify", "--record", "a.json"])).is_err());
        assert!(parse_command(&args(&["prove", "--bogus", "x"])).is_err());
    }

    #[test]
    fn issued_record_yields_inputs() {
        let issued = issue(Some("denkeni".into()), Some("0750101".into())).unwrap();
        let claims = parse_claims_input(&issued.claims_input).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].name, "name");

        let key = PublicKeyMaterial::Jwk(issued.public_jwk.clone());
        assert!(verify_token(&issued.token, &key).unwrap());
        let inputs =
            generate_jwt_inputs(&Default::default(), &issued.token, &key, &claims).unwrap();
        assert_eq!(inputs.len(), 10);
    }
}
