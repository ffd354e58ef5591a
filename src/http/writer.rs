use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

fn serialize_response(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers; transport framing is owned by the writer
    for (k, v) in &resp.headers {
        if k == "content-length" || k == "connection" || k == "transfer-encoding" {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    let bodiless = resp.status.is_bodiless();
    if !bodiless {
        buf.extend_from_slice(format!("content-length: {}\r\n", resp.body.len()).as_bytes());
    }
    let connection = if keep_alive { "keep-alive" } else { "close" };
    buf.extend_from_slice(format!("connection: {}\r\n", connection).as_bytes());

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    if !bodiless {
        buf.extend_from_slice(&resp.body);
    }

    buf
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, keep_alive: bool) -> Self {
        Self {
            buffer: serialize_response(response, keep_alive),
            written: 0,
        }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
