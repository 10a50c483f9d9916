use std::process::Stdio;

use mineherd_core::Config;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::process::{Child, Command};

/// Reserved line on the control socket: intercepted by the supervisor, never
/// forwarded as-is. Also the literal console command that shuts the server
/// down, which is what the supervisor writes once it intercepts it.
pub const STOP_SENTINEL: &str = "stop";

/// The supervisor daemon: owns the server child and its stdin, serves the
/// control socket, relays newline-delimited command lines into the child.
///
/// Runs detached (launched via the hidden `daemon run` subcommand with null
/// stdio); also usable in the foreground for debugging, where ctrl-c behaves
/// like the stop sentinel.
pub async fn run(config: &Config) {
	tracing_subscriber::fmt().init();
	// Fully detach from the launching session. Fails harmlessly when the
	// process already leads one.
	let _ = nix::unistd::setsid();

	let socket_path = config.paths.socket.clone();
	if let Some(parent) = socket_path.parent() {
		let _ = std::fs::create_dir_all(parent);
	}
	// A stale file from an unclean shutdown must not block rebinding.
	if socket_path.exists() {
		let _ = std::fs::remove_file(&socket_path);
	}
	// Bind before spawning: a bind failure aborts the launch with no child
	// process left behind.
	let listener = match UnixListener::bind(&socket_path) {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind {}: {}", socket_path.display(), e);
			return;
		}
	};

	let mut child = match spawn_server(config) {
		Ok(c) => c,
		Err(e) => {
			tracing::error!("failed to spawn server: {}", e);
			drop(listener);
			let _ = std::fs::remove_file(&socket_path);
			return;
		}
	};
	let Some(mut stdin) = child.stdin.take() else {
		tracing::error!("server child has no stdin handle");
		let _ = child.kill().await;
		drop(listener);
		let _ = std::fs::remove_file(&socket_path);
		return;
	};

	tracing::info!(
		"supervising {} (pid {:?}) on {}",
		config.server.service_name,
		child.id(),
		socket_path.display()
	);

	let sentinel = tokio::select! {
		sentinel = relay_loop(&listener, &mut child, &mut stdin) => sentinel,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("interrupted, stopping server");
			true
		}
	};

	// Close the listening socket before blocking on the child's exit, so a
	// subsequent start is never blocked by a half-dead supervisor.
	drop(listener);

	if sentinel {
		if let Err(e) = stdin.write_all(b"stop\n").await {
			tracing::warn!("failed to send stop to server: {}", e);
		}
		let _ = stdin.flush().await;
		drop(stdin);
		match child.wait().await {
			Ok(status) => tracing::info!("server exited: {}", status),
			Err(e) => tracing::warn!("failed waiting for server exit: {}", e),
		}
	}

	if socket_path.exists() {
		let _ = std::fs::remove_file(&socket_path);
	}
	tracing::info!("supervisor exiting");
}

/// Accept and serve one connection at a time. Returns true when a client
/// sent the stop sentinel, false when the child turned out to be dead.
async fn relay_loop(
	listener: &UnixListener,
	child: &mut Child,
	stdin: &mut tokio::process::ChildStdin,
) -> bool {
	loop {
		let (stream, _) = match listener.accept().await {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};
		if relay_connection(stream, stdin).await {
			return true;
		}
		match child.try_wait() {
			Ok(Some(status)) => {
				tracing::info!("server exited on its own: {}", status);
				return false;
			}
			Ok(None) => {}
			Err(e) => tracing::warn!("failed to poll server: {}", e),
		}
	}
}

/// Relay one client connection into the child's stdin. Partial trailing data
/// is buffered across reads and prefixed to the next read. Returns true iff
/// the stop sentinel was received.
pub async fn relay_connection<S, W>(mut stream: S, stdin: &mut W) -> bool
where
	S: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut pending: Vec<u8> = Vec::new();
	let mut buf = [0u8; 1024];
	loop {
		let n = match stream.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => n,
			Err(_) => break,
		};
		pending.extend_from_slice(&buf[..n]);
		while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = pending.drain(..=pos).collect();
			let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
			if line == STOP_SENTINEL {
				return true;
			}
			if let Err(e) = forward(stdin, &line).await {
				tracing::warn!("failed to forward {:?}: {}", line, e);
				return false;
			}
		}
	}
	false
}

async fn forward<W: AsyncWrite + Unpin>(stdin: &mut W, line: &str) -> std::io::Result<()> {
	stdin.write_all(line.as_bytes()).await?;
	stdin.write_all(b"\n").await?;
	stdin.flush().await
}

fn spawn_server(config: &Config) -> std::io::Result<Child> {
	let argv = config.invocation();
	let mut cmd = Command::new(&argv[0]);
	cmd.args(&argv[1..])
		.current_dir(&config.server.dir)
		.stdin(Stdio::piped())
		.stdout(Stdio::null())
		.stderr(Stdio::null());
	cmd.spawn()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn sentinel_is_intercepted_after_forwarding() {
		let (mut client, server) = tokio::io::duplex(1024);
		let (mut sink, mut sink_read) = tokio::io::duplex(1024);

		client.write_all(b"say hi\nstop\nnever forwarded\n").await.unwrap();
		let sentinel = relay_connection(server, &mut sink).await;
		assert!(sentinel);

		drop(sink);
		let mut forwarded = Vec::new();
		sink_read.read_to_end(&mut forwarded).await.unwrap();
		assert_eq!(forwarded, b"say hi\n");
	}

	#[tokio::test]
	async fn partial_lines_are_buffered_across_reads() {
		let (mut client, server) = tokio::io::duplex(64);
		let (sink, mut sink_read) = tokio::io::duplex(1024);

		let relay = tokio::spawn(async move {
			let mut sink = sink;
			relay_connection(server, &mut sink).await
		});

		client.write_all(b"say he").await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		client.write_all(b"llo\n").await.unwrap();
		drop(client);

		let sentinel = relay.await.unwrap();
		assert!(!sentinel);

		let mut forwarded = Vec::new();
		sink_read.read_to_end(&mut forwarded).await.unwrap();
		assert_eq!(forwarded, b"say hello\n");
	}

	#[tokio::test]
	async fn connection_without_sentinel_relays_everything() {
		let (mut client, server) = tokio::io::duplex(1024);
		let (mut sink, mut sink_read) = tokio::io::duplex(1024);

		client.write_all(b"list\nsave-all\n").await.unwrap();
		drop(client);
		let sentinel = relay_connection(server, &mut sink).await;
		assert!(!sentinel);

		drop(sink);
		let mut forwarded = Vec::new();
		sink_read.read_to_end(&mut forwarded).await.unwrap();
		assert_eq!(forwarded, b"list\nsave-all\n");
	}

	#[tokio::test]
	async fn unterminated_trailing_data_is_dropped_on_close() {
		let (mut client, server) = tokio::io::duplex(1024);
		let (mut sink, mut sink_read) = tokio::io::duplex(1024);

		client.write_all(b"say done\nhalf a lin").await.unwrap();
		drop(client);
		let sentinel = relay_connection(server, &mut sink).await;
		assert!(!sentinel);

		drop(sink);
		let mut forwarded = Vec::new();
		sink_read.read_to_end(&mut forwarded).await.unwrap();
		assert_eq!(forwarded, b"say done\n");
	}
}
