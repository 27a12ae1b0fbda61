use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    circuits::CircuitInputs,
    config::CircuitAssets,
    error::{Error, Result},
    fetch::AssetFetcher,
};

/// Groth16 proof as emitted by snarkjs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    pub protocol: String,
    pub curve: String,
}

pub type PublicSignals = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOutput {
    pub proof: Groth16Proof,
    pub public_signals: PublicSignals,
}

/// External Groth16 proving engine.
#[allow(async_fn_in_trait)]
pub trait Groth16Prover {
    /// Compute the witness with `program` and prove it with `proving_key`.
    async fn full_prove(
        &self,
        inputs: &CircuitInputs,
        program: &[u8],
        proving_key: &[u8],
    ) -> Result<ProofOutput>;

    async fn verify(
        &self,
        verification_key: &[u8],
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool>;
}

/// Drives a [`Groth16Prover`] with artifacts pulled through an [`AssetFetcher`].
pub struct ProofService<P> {
    prover: P,
    fetcher: AssetFetcher,
    assets: CircuitAssets,
}

impl<P: Groth16Prover> ProofService<P> {
    pub fn new(prover: P, fetcher: AssetFetcher, assets: CircuitAssets) -> Self {
        Self {
            prover,
            fetcher,
            assets,
        }
    }

    /// Prove `inputs`. The proving key is only fetched once the program is in hand.
    pub async fn generate_proof(&self, inputs: CircuitInputs) -> Result<ProofOutput> {
        let t0 = Instant::now();
        let program = self
            .fetcher
            .fetch(&self.assets.program)
            .await
            .map_err(|e| Error::proof_generation("fetching the circuit program", e))?;
        let proving_key = self
            .fetcher
            .fetch(&self.assets.proving_key)
            .await
            .map_err(|e| Error::proof_generation("fetching the proving key", e))?;
        let fetch_ms = t0.elapsed().as_millis();
        info!(
            elapsed_ms = fetch_ms,
            program_bytes = program.len(),
            proving_key_bytes = proving_key.len(),
            "circuit assets ready"
        );

        let t0 = Instant::now();
        let output = self
            .prover
            .full_prove(&inputs, &program, &proving_key)
            .await
            .map_err(|e| Error::proof_generation("running the prover", e))?;
        let prove_ms = t0.elapsed().as_millis();
        info!(
            elapsed_ms = prove_ms,
            public_signals = output.public_signals.len(),
            "Groth16 fullProve"
        );

        Ok(output)
    }

    pub async fn verify_proof(
        &self,
        proof: &Groth16Proof,
        public_signals: &[String],
    ) -> Result<bool> {
        let verification_key = self
            .fetcher
            .fetch(&self.assets.verification_key)
            .await
            .map_err(|e| Error::proof_verification("fetching the verification key", e))?;

        let t0 = Instant::now();
        let valid = self
            .prover
            .verify(&verification_key, public_signals, proof)
            .await
            .map_err(|e| Error::proof_verification("running the verifier", e))?;
        let verify_ms = t0.elapsed().as_millis();
        info!(elapsed_ms = verify_ms, valid, "Groth16 verify");

        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{circuits::InputValue, config::FetchConfig};
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };

    /// Echoes its inputs back so the service wiring can be checked.
    #[derive(Default)]
    struct RecordingProver {
        prove_calls: AtomicUsize,
        fail: bool,
    }

    impl Groth16Prover for RecordingProver {
        async fn full_prove(
            &self,
            inputs: &CircuitInputs,
            program: &[u8],
            proving_key: &[u8],
        ) -> Result<ProofOutput> {
            self.prove_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Prover("witness does not satisfy constraints".into()));
            }
            Ok(ProofOutput {
                proof: Groth16Proof {
                    pi_a: vec![String::from_utf8_lossy(program).into_owned()],
                    pi_b: vec![vec![String::from_utf8_lossy(proving_key).into_owned()]],
                    pi_c: vec![inputs.len().to_string()],
                    protocol: "groth16".into(),
                    curve: "bn128".into(),
                },
                public_signals: vec!["1".into()],
            })
        }

        async fn verify(
            &self,
            verification_key: &[u8],
            public_signals: &[String],
            proof: &Groth16Proof,
        ) -> Result<bool> {
            Ok(verification_key == b"vk" && public_signals == ["1"] && proof.protocol == "groth16")
        }
    }

    struct TempAssets {
        dir: PathBuf,
    }

    impl TempAssets {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("zkvc-prover-{}", rand::random::<u64>()));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("jwt.wasm"), b"wasm").unwrap();
            std::fs::write(dir.join("jwt.zkey"), b"zkey").unwrap();
            std::fs::write(dir.join("vk.json"), b"vk").unwrap();
            Self { dir }
        }

        fn assets(&self) -> CircuitAssets {
            let path = |name: &str| self.dir.join(name).display().to_string();
            CircuitAssets {
                program: path("jwt.wasm"),
                proving_key: path("jwt.zkey"),
                verification_key: path("vk.json"),
            }
        }
    }

    impl Drop for TempAssets {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn inputs() -> CircuitInputs {
        let mut inputs = CircuitInputs::new();
        inputs.insert("matchesCount", InputValue::scalar(2u32));
        inputs
    }

    fn service(prover: RecordingProver, assets: CircuitAssets) -> ProofService<RecordingProver> {
        let fetcher = AssetFetcher::new(&FetchConfig::default()).unwrap();
        ProofService::new(prover, fetcher, assets)
    }

    #[tokio::test]
    async fn proves_with_fetched_assets_and_verifies() {
        let tmp = TempAssets::new();
        let service = service(RecordingProver::default(), tmp.assets());

        let output = service.generate_proof(inputs()).await.unwrap();
        assert_eq!(output.proof.pi_a, vec!["wasm"]);
        assert_eq!(output.proof.pi_b, vec![vec!["zkey"]]);
        assert_eq!(output.proof.pi_c, vec!["1"]);

        assert!(service
            .verify_proof(&output.proof, &output.public_signals)
            .await
            .unwrap());
        assert!(!service.verify_proof(&output.proof, &["2".to_string()]).await.unwrap());
    }

    #[tokio::test]
    async fn missing_program_stops_before_proving() {
        let tmp = TempAssets::new();
        let mut assets = tmp.assets();
        assets.program = tmp.dir.join("absent.wasm").display().to_string();
        let service = service(RecordingProver::default(), assets);

        let err = service.generate_proof(inputs()).await.unwrap_err();
        match err {
            Error::ProofGeneration { stage, source } => {
                assert_eq!(stage, "fetching the circuit program");
                assert!(matches!(*source, Error::AssetFetch { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(service.prover.prove_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prover_failure_keeps_cause() {
        let tmp = TempAssets::new();
        let prover = RecordingProver {
            fail: true,
            ..Default::default()
        };
        let service = service(prover, tmp.assets());

        let err = service.generate_proof(inputs()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ProofGeneration { stage: "running the prover", ref source }
                if matches!(**source, Error::Prover(_))
        ));
    }

    #[tokio::test]
    async fn missing_verification_key_is_an_error_not_false() {
        let tmp = TempAssets::new();
        let mut assets = tmp.assets();
        assets.verification_key = tmp.dir.join("absent.json").display().to_string();
        let service = service(RecordingProver::default(), assets);

        let proof = Groth16Proof {
            pi_a: vec![],
            pi_b: vec![],
            pi_c: vec![],
            protocol: "groth16".into(),
            curve: "bn128".into(),
        };
        assert!(matches!(
            service.verify_proof(&proof, &[]).await,
            Err(Error::ProofVerification { .. })
        ));
    }
}
