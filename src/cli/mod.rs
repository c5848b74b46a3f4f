//! Command-line interface for xlens.
//!
//! Provides commands for probing device compatibility, inspecting the
//! device key, running a simulated end-to-end capture, and fetching
//! verification results.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{HttpServerApi, ServerApi};
use crate::capture::compat;
use crate::capture::sim::{SimulatedCamera, SimulatedMotion};
use crate::config::ClientConfig;
use crate::core::CaptureClient;
use crate::crypto::KeyStore;
use crate::upload::HttpUploader;

/// xlens - verified vertical-jump capture client
#[derive(Parser, Debug)]
#[command(name = "xlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe the environment for capture capabilities
    Probe,

    /// Manage the device signing key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Run a capture against the server using simulated devices
    Capture {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "3")]
        duration: u64,
    },

    /// Fetch the verification result for a submitted jump
    Result {
        /// Jump ID returned by a submission
        jump_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Show the device key id and public key
    Show,

    /// Delete the device key (resets trust history on the server)
    Delete,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ClientConfig::load()?;

        match self.command {
            Commands::Probe => probe(&config).await,
            Commands::Key { command } => key(&config, command),
            Commands::Capture { duration } => capture(config, duration).await,
            Commands::Result { jump_id } => result(&config, &jump_id).await,
        }
    }
}

async fn probe(config: &ClientConfig) -> Result<()> {
    let camera = SimulatedCamera::new();
    let motion = SimulatedMotion::new();
    let report = compat::probe(&camera, &motion, &config.encoder.binary).await;

    println!("compatible:        {}", report.is_compatible);
    println!("camera:            {}", report.has_camera);
    println!("hardware encoder:  {}", report.has_hardware_encoder);
    println!("software recorder: {}", report.has_software_recorder);
    println!("motion sensor:     {}", report.has_motion);
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        println!("error: {}", error);
    }
    Ok(())
}

fn key(config: &ClientConfig, command: KeyCommands) -> Result<()> {
    let store = KeyStore::open(config.keys_dir()).context("Failed to open key store")?;
    let user_id = config.user_id()?;

    match command {
        KeyCommands::Show => {
            let key = store
                .get_or_create(&user_id)
                .context("Failed to load device key")?;
            println!("user:       {}", user_id);
            println!("key id:     {}", key.key_id);
            println!("public key: {}", key.public_key);
        }
        KeyCommands::Delete => {
            store.delete(&user_id).context("Failed to delete key")?;
            println!("Device key deleted. The next capture will generate a fresh one.");
        }
    }
    Ok(())
}

async fn capture(config: ClientConfig, duration_secs: u64) -> Result<()> {
    let server = Arc::new(HttpServerApi::new(config.server_url.clone()));
    let uploader = Arc::new(HttpUploader::new(
        config.upload_chunk_size,
        config.upload_retry_delays_ms.clone(),
    ));

    let mut client = CaptureClient::new(
        config,
        server,
        uploader,
        Box::new(SimulatedCamera::new()),
        Box::new(SimulatedMotion::new()),
    )
    .context("Failed to construct capture client")?;

    client.check_compatibility().await?;
    client.request_permissions().await?;

    let session = client.create_session().await?;
    println!("Session {} (verify code: {})", session.id, session.nonce_display);

    client.start_capture().await?;
    println!("Recording for {}s...", duration_secs);
    tokio::time::sleep(std::time::Duration::from_secs(duration_secs)).await;

    let result = client.stop_capture().await?;
    println!(
        "Captured {} frames over {}ms at {:.1} fps ({} sensor samples)",
        result.frame_count,
        result.duration_ms(),
        result.fps,
        result.sensor_data.len()
    );

    let submission = client.submit_jump().await?;
    println!(
        "Submitted jump {} (status: {:?}, tier: {:?})",
        submission.jump_id, submission.status, submission.verification_tier
    );
    Ok(())
}

async fn result(config: &ClientConfig, jump_id: &str) -> Result<()> {
    let server = HttpServerApi::new(config.server_url.clone());
    let result = server.get_jump(jump_id).await?;

    println!("jump:   {}", result.jump_id);
    println!("status: {:?}", result.status);
    println!("tier:   {:?}", result.verification_tier);
    if let Some(height) = result.height {
        println!("height: {:.1}\" ({:.1} cm)", height.inches, height.centimeters);
    }
    if let Some(flags) = result.flags {
        if !flags.is_empty() {
            println!("flags:  {}", flags.join(", "));
        }
    }
    Ok(())
}
