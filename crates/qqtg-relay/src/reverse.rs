//! Reverse conversion: a Telegram topic message into QQ outbound segments.

use std::io::Cursor;

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use qqtg_channels::{
    DestinationChannel, DestinationSegment, OutboundSegment, SourceOutbound, StickerFormat,
};
use tracing::{debug, warn};

use crate::convert::ConversionError;

/// Convert `segments` for the QQ side. Files are fetched through `dest`, the
/// credential that received the message. Never fails as a whole.
pub async fn convert_reverse(
    dest: &dyn DestinationChannel,
    segments: &[DestinationSegment],
) -> SourceOutbound {
    let mut out = SourceOutbound::default();
    for segment in segments {
        match convert_segment(dest, segment).await {
            Ok(converted) => push(&mut out, converted),
            Err(e) => {
                warn!(error = %e, "segment conversion failed");
                push(
                    &mut out,
                    OutboundSegment::Text(format!("{}[error: {}]", e.placeholder, e.details)),
                );
            }
        }
    }
    out
}

/// Append, merging adjacent text runs.
fn push(out: &mut SourceOutbound, segment: OutboundSegment) {
    if let (Some(OutboundSegment::Text(prev)), OutboundSegment::Text(next)) =
        (out.segments.last_mut(), &segment)
    {
        prev.push_str(next);
        return;
    }
    out.segments.push(segment);
}

async fn convert_segment(
    dest: &dyn DestinationChannel,
    segment: &DestinationSegment,
) -> Result<OutboundSegment, ConversionError> {
    match segment {
        DestinationSegment::Text { text } => Ok(OutboundSegment::Text(text.clone())),
        DestinationSegment::Photo { file_id } => {
            let data = fetch(dest, file_id, "image").await?;
            Ok(OutboundSegment::Image(to_qq_image(data, "image").await?))
        }
        DestinationSegment::Animation { file_id } => {
            let data = fetch(dest, file_id, "animation").await?;
            // Telegram animations are usually MP4; those go over as a file.
            if image::guess_format(&data).is_ok() {
                return Ok(OutboundSegment::Image(to_qq_image(data, "animation").await?));
            }
            let url = file_url(dest, file_id, "animation").await?;
            Ok(OutboundSegment::File {
                url,
                name: Some("animation.mp4".to_string()),
            })
        }
        DestinationSegment::Sticker {
            file_id,
            format,
            thumbnail,
        } => {
            let source = match (format, thumbnail) {
                (StickerFormat::Static, _) => file_id,
                (_, Some(thumb)) => {
                    debug!(format = ?format, "sticker has no static form, using thumbnail");
                    thumb
                }
                (_, None) => {
                    return Err(ConversionError {
                        placeholder: "[sticker]".to_string(),
                        details: "sticker has no thumbnail".to_string(),
                    })
                }
            };
            let data = fetch(dest, source, "sticker").await?;
            Ok(OutboundSegment::Image(to_qq_image(data, "sticker").await?))
        }
        DestinationSegment::Document { file_id, name } => Ok(OutboundSegment::File {
            url: file_url(dest, file_id, "file").await?,
            name: name.clone(),
        }),
        DestinationSegment::Unsupported { kind } => {
            warn!(kind = %kind, "unsupported message kind");
            Ok(OutboundSegment::Text(format!("[{kind}]")))
        }
    }
}

async fn fetch(
    dest: &dyn DestinationChannel,
    file_id: &str,
    noun: &str,
) -> Result<Vec<u8>, ConversionError> {
    dest.fetch_file(file_id).await.map_err(|e| {
        warn!(file_id, error = %e, "telegram download failed");
        ConversionError {
            placeholder: format!("[{noun}]"),
            details: format!("failed to download {noun}"),
        }
    })
}

async fn file_url(
    dest: &dyn DestinationChannel,
    file_id: &str,
    noun: &str,
) -> Result<String, ConversionError> {
    dest.file_url(file_id).await.map_err(|e| ConversionError {
        placeholder: format!("[{noun}]"),
        details: e.to_string(),
    })
}

/// Decode off the async runtime; WebP animations can be large.
async fn to_qq_image(data: Vec<u8>, noun: &str) -> Result<Vec<u8>, ConversionError> {
    let placeholder = format!("[{noun}]");
    tokio::task::spawn_blocking(move || reencode(data))
        .await
        .map_err(|e| ConversionError {
            placeholder: placeholder.clone(),
            details: e.to_string(),
        })?
        .map_err(|e| ConversionError {
            placeholder,
            details: format!("cannot convert image: {e}"),
        })
}

/// Turn bytes into something QQ displays: JPEG, PNG and GIF pass through,
/// animated WebP becomes a looping GIF and static WebP becomes PNG.
pub fn reencode(data: Vec<u8>) -> image::ImageResult<Vec<u8>> {
    match image::guess_format(&data)? {
        ImageFormat::WebP => webp_to_qq(&data),
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif => Ok(data),
        _ => {
            let img = image::load_from_memory(&data)?;
            encode_png(&img)
        }
    }
}

fn webp_to_qq(data: &[u8]) -> image::ImageResult<Vec<u8>> {
    let decoder = WebPDecoder::new(Cursor::new(data))?;
    if !decoder.has_animation() {
        return encode_png(&DynamicImage::from_decoder(decoder)?);
    }

    let frames = decoder.into_frames().collect_frames()?;
    debug!(frames = frames.len(), "re-encoding animated webp as gif");
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

fn encode_png(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
