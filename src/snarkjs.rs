//! [`Groth16Prover`] backed by the `snarkjs` command line tool.

use std::{
    path::{Path, PathBuf},
    process::Output,
};

use tokio::{fs, process::Command};
use tracing::{debug, warn};

use crate::{
    circuits::CircuitInputs,
    error::{Error, Result},
    prover::{Groth16Proof, Groth16Prover, ProofOutput},
};

pub const DEFAULT_BINARY: &str = "snarkjs";

/// Exit code of `snarkjs groth16 verify` for a proof that does not verify.
const EXIT_INVALID_PROOF: i32 = 1;

#[derive(Debug, Clone)]
pub struct SnarkjsProver {
    binary: String,
    leading_args: Vec<String>,
    work_root: PathBuf,
}

impl Default for SnarkjsProver {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl SnarkjsProver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            leading_args: Vec::new(),
            work_root: std::env::temp_dir(),
        }
    }

    /// Split a command line such as `npx snarkjs` into program and leading arguments.
    pub fn from_command_line(command: &str) -> Self {
        let mut words = command.split_whitespace();
        let mut prover = Self::new(words.next().unwrap_or(DEFAULT_BINARY));
        prover.leading_args = words.map(String::from).collect();
        prover
    }

    /// Place scratch directories under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    async fn scratch(&self) -> Result<Scratch> {
        let dir = self
            .work_root
            .join(format!("zkvc-{:016x}", rand::random::<u64>()));
        fs::create_dir_all(&dir).await?;
        Ok(Scratch { dir })
    }

    /// Run snarkjs and hand back whatever it produced, whatever the exit status.
    async fn exec(&self, args: &[&str], cwd: &Path) -> Result<Output> {
        debug!(binary = %self.binary, ?args, "invoking snarkjs");
        Command::new(&self.binary)
            .args(&self.leading_args)
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| Error::Prover(format!("cannot run {}: {e}", self.binary)))
    }

    async fn run(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let output = self.exec(args, cwd).await?;
        if !output.status.success() {
            return Err(self.failure(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn failure(&self, args: &[&str], output: &Output) -> Error {
        Error::Prover(format!(
            "{} {} exited with {}: {} {}",
            self.binary,
            args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
            output.status,
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

impl Groth16Prover for SnarkjsProver {
    async fn full_prove(
        &self,
        inputs: &CircuitInputs,
        program: &[u8],
        proving_key: &[u8],
    ) -> Result<ProofOutput> {
        let scratch = self.scratch().await?;
        fs::write(scratch.path("input.json"), serde_json::to_vec(inputs)?).await?;
        fs::write(scratch.path("circuit.wasm"), program).await?;
        fs::write(scratch.path("circuit.zkey"), proving_key).await?;

        self.run(
            &[
                "groth16",
                "fullprove",
                "input.json",
                "circuit.wasm",
                "circuit.zkey",
                "proof.json",
                "public.json",
            ],
            &scratch.dir,
        )
        .await?;

        let proof: Groth16Proof = serde_json::from_slice(&fs::read(scratch.path("proof.json")).await?)?;
        let public_signals: Vec<String> =
            serde_json::from_slice(&fs::read(scratch.path("public.json")).await?)?;
        Ok(ProofOutput {
            proof,
            public_signals,
        })
    }

    async fn verify(
        &self,
        verification_key: &[u8],
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool> {
        let scratch = self.scratch().await?;
        fs::write(scratch.path("vkey.json"), verification_key).await?;
        fs::write(scratch.path("public.json"), serde_json::to_vec(public_signals)?).await?;
        fs::write(scratch.path("proof.json"), serde_json::to_vec(proof)?).await?;

        let args = ["groth16", "verify", "vkey.json", "public.json", "proof.json"];
        let output = self.exec(&args, &scratch.dir).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        parse_verify_output(output.status.code(), &stdout, &stderr)
            .ok_or_else(|| self.failure(&args, &output))
    }
}

/// snarkjs exits 0 with `OK!` for a valid proof and 1 with `Invalid proof`
/// for one that does not verify. Anything else is not a verdict.
fn parse_verify_output(code: Option<i32>, stdout: &str, stderr: &str) -> Option<bool> {
    let says = |needle: &str| stdout.contains(needle) || stderr.contains(needle);
    match code {
        Some(0) if says("OK!") => Some(true),
        Some(EXIT_INVALID_PROOF) if says("Invalid proof") => Some(false),
        _ => None,
    }
}

struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove scratch dir");
        }
    }
}
