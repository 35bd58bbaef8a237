//! # Artifact Delivery
//!
//! Streams a processed artifact back to the caller. The body is produced by
//! a spawned reader task feeding a channel, so a read failure halfway
//! through the file can only truncate the stream - the status line and
//! headers are already on the wire. Such failures go to the operational
//! log, never to the client.

use crate::pipeline::ProcessedDelivery;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use tokio::io::AsyncReadExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

/// Read buffer for streaming the artifact body.
const CHUNK_BYTES: usize = 64 * 1024;

/// Build the download response for a processed artifact.
///
/// The Content-Disposition filename is `instrumental_<original name>`; the
/// content type is whatever the upload declared. Cleanup of the file is
/// already scheduled and does not wait for this stream to finish: the
/// cleanup delay is the window the client has to read the body.
pub fn attachment_response(delivery: ProcessedDelivery) -> HttpResponse {
    let ProcessedDelivery {
        path,
        download_name,
        media_type,
    } = delivery;

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(8);

    tokio::spawn(async move {
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                // Headers may already be committed; log and end the body
                error!(path = %path.display(), error = %e, "delivery aborted: cannot open artifact");
                return;
            }
        };

        let mut sent: u64 = 0;
        loop {
            let mut buf = vec![0u8; CHUNK_BYTES];
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    sent += n as u64;
                    if tx.send(Ok(Bytes::from(buf))).await.is_err() {
                        // Client went away; the external invocation already
                        // ran to completion and cleanup stays scheduled
                        debug!(path = %path.display(), "client disconnected during delivery");
                        return;
                    }
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, sent_bytes = sent, "delivery interrupted mid-stream");
                    return;
                }
            }
        }
        debug!(path = %path.display(), sent_bytes = sent, "delivery complete");
    });

    HttpResponse::Ok()
        .content_type(media_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(download_name)],
        })
        .streaming(ReceiverStream::new(rx))
}
