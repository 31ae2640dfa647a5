use std::path;

use anyhow::Context;
use bytes::BytesMut;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use fmp4_stream::{ParserConfig, Parser as Fmp4Parser};

#[derive(Parser)]
struct Cli {
	/// Video input ffmpeg should read from, e.g. /dev/video0 or a file path.
	#[arg(short, long, default_value = "/dev/video0")]
	pub input: path::PathBuf,

	/// Base name used for the init segment and each media segment's URI.
	#[arg(long, default_value = "stream")]
	pub name: String,

	/// Number of segments kept in the HLS playlist ring.
	#[arg(long)]
	pub hls_list_size: Option<u8>,

	/// Number of segments kept in the replay buffer ring.
	#[arg(long)]
	pub buffer_list_size: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let tracer = tracing_subscriber::FmtSubscriber::builder()
		.with_max_level(tracing::Level::INFO)
		.finish();
	tracing::subscriber::set_global_default(tracer).unwrap();

	let cli = Cli::parse();

	let mut ffmpeg = Command::new("ffmpeg")
		.args(["-f", "v4l2", "-i"])
		.arg(&cli.input)
		.args([
			"-movflags",
			"frag_keyframe+empty_moov",
			"-f",
			"mp4",
			"-c:v",
			"libx264",
			"pipe:1",
		])
		.stdout(std::process::Stdio::piped())
		.spawn()
		.context("failed to spawn ffmpeg")?;

	let mut stdout = ffmpeg.stdout.take().context("ffmpeg produced no stdout pipe")?;

	let mut parser = Fmp4Parser::new(ParserConfig {
		hls_base: Some(cli.name.clone()),
		hls_list_size: cli.hls_list_size,
		buffer_list_size: cli.buffer_list_size,
	});

	parser.on_initialized(|_| tracing::info!("initialized"));
	parser.on_segment(|bytes| tracing::info!(len = bytes.len(), "segment"));
	parser.on_error(|err| tracing::error!(error = %err, "parse error"));

	let mut buf = BytesMut::with_capacity(64 * 1024);

	loop {
		let n = stdout
			.read_buf(&mut buf)
			.await
			.context("failed to read from ffmpeg stdout")?;
		if n == 0 {
			break;
		}

		let chunk = buf.split().freeze();
		if let Err(err) = parser.write(&chunk[..]) {
			tracing::error!(error = %err, "stopping: parser poisoned");
			break;
		}
	}

	ffmpeg.wait().await.context("ffmpeg exited with an error")?;

	Ok(())
}
