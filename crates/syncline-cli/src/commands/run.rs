use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use syncline_engine::Registry;

/// Execute the `run` command: control messages on stdin, protocol on stdout.
pub async fn execute(registry: &Registry, connector: &str, command: &str) -> Result<()> {
    let control = read_control(std::io::stdin()).await?;
    super::dispatch(registry, connector, command, Cursor::new(control)).await
}

/// Drain `input` on the blocking pool so no runtime worker waits on it.
async fn read_control(mut input: impl Read + Send + 'static) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut control = Vec::new();
        input
            .read_to_end(&mut control)
            .context("Failed to read control stream")?;
        Ok(control)
    })
    .await
    .context("Control stream reader task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn control_stream_is_read_to_the_end() {
        let input = "{\"type\":\"SETTINGS\",\"settings\":{\"format\":\"singer\"}}\n{\"type\":\"CONFIG\",\"config\":null}\n";
        let control = read_control(Cursor::new(input.as_bytes().to_vec())).await.unwrap();
        assert_eq!(control, input.as_bytes());
    }
}
