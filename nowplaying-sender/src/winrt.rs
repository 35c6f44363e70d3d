//! Windows media-session backend (`GlobalSystemMediaTransportControls`).
//!
//! WinRT async operations are driven to completion on Tokio's blocking
//! pool so the observer's scheduler never stalls on the OS.

use std::future::IntoFuture;
use std::sync::Arc;

use async_trait::async_trait;
use futures::executor::block_on;
use tracing::{debug, warn};
use windows::Foundation::TypedEventHandler;
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession as Session,
    GlobalSystemMediaTransportControlsSessionManager as SessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as WinStatus,
};
use windows::Storage::Streams::{DataReader, IRandomAccessStreamReference, InputStreamOptions};
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx};
use windows::core::Result as WinResult;

use nowplaying_core::{NowPlayingError, PlaybackStatus};

use crate::media::{
    MediaProperties, MediaSession, MediaSessionManager, SessionEvent, SessionNotifier,
    Subscription, ThumbnailSource, read_sized,
};

const READ_CHUNK: u32 = 64 * 1024;

/// Join the process-wide multithreaded apartment on the current thread.
pub fn init_apartment() {
    let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if hr.is_err() && hr != RPC_E_CHANGED_MODE {
        warn!("COM init failed: {hr:?}");
    }
}

fn win_err(e: windows::core::Error) -> NowPlayingError {
    NowPlayingError::source(e.to_string())
}

fn block_on_operation<O, T>(operation: O) -> WinResult<T>
where
    O: IntoFuture<Output = WinResult<T>>,
{
    block_on(operation.into_future())
}

async fn blocking<T, F>(f: F) -> Result<T, NowPlayingError>
where
    T: Send + 'static,
    F: FnOnce() -> WinResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| NowPlayingError::Other(format!("media worker panicked: {e}")))?
        .map_err(win_err)
}

// ── Manager ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct WindowsMediaManager;

#[async_trait]
impl MediaSessionManager for WindowsMediaManager {
    async fn request_current_session(
        &self,
    ) -> Result<Option<Arc<dyn MediaSession>>, NowPlayingError> {
        let session = blocking(|| {
            let manager = block_on_operation(SessionManager::RequestAsync()?)?;
            // A null session comes back as an error; treat it as "none".
            Ok(manager.GetCurrentSession().ok())
        })
        .await?;

        Ok(session.map(|session| Arc::new(WindowsSession { session }) as Arc<dyn MediaSession>))
    }
}

// ── Session ──────────────────────────────────────────────────────

pub struct WindowsSession {
    session: Session,
}

#[async_trait]
impl MediaSession for WindowsSession {
    async fn try_get_media_properties(&self) -> Result<MediaProperties, NowPlayingError> {
        let session = self.session.clone();
        blocking(move || {
            let props = block_on_operation(session.TryGetMediaPropertiesAsync()?)?;
            let thumbnail = props
                .Thumbnail()
                .ok()
                .map(|reference| Arc::new(WindowsThumbnail { reference }) as Arc<dyn ThumbnailSource>);
            Ok(MediaProperties {
                title: props.Title()?.to_string_lossy(),
                artist: props.Artist()?.to_string_lossy(),
                album: props.AlbumTitle()?.to_string_lossy(),
                thumbnail,
            })
        })
        .await
    }

    fn get_playback_info(&self) -> Result<PlaybackStatus, NowPlayingError> {
        let status = self
            .session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map_err(win_err)?;
        Ok(match status {
            WinStatus::Playing => PlaybackStatus::Playing,
            WinStatus::Paused => PlaybackStatus::Paused,
            WinStatus::Stopped => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Unknown,
        })
    }

    fn subscribe(&self, notifier: SessionNotifier) -> Result<Subscription, NowPlayingError> {
        let on_props = notifier.clone();
        let props_token = self
            .session
            .MediaPropertiesChanged(&TypedEventHandler::new(move |_, _| {
                on_props.notify(SessionEvent::MediaPropertiesChanged);
                Ok(())
            }))
            .map_err(win_err)?;

        let on_info = notifier;
        let info_token = match self
            .session
            .PlaybackInfoChanged(&TypedEventHandler::new(move |_, _| {
                on_info.notify(SessionEvent::PlaybackInfoChanged);
                Ok(())
            })) {
            Ok(token) => token,
            Err(e) => {
                let _ = self.session.RemoveMediaPropertiesChanged(props_token);
                return Err(win_err(e));
            }
        };

        let session = self.session.clone();
        Ok(Subscription::new(move || {
            if let Err(e) = session.RemoveMediaPropertiesChanged(props_token) {
                debug!("failed to remove properties handler: {e}");
            }
            if let Err(e) = session.RemovePlaybackInfoChanged(info_token) {
                debug!("failed to remove playback handler: {e}");
            }
        }))
    }
}

// ── Thumbnail ────────────────────────────────────────────────────

struct WindowsThumbnail {
    reference: IRandomAccessStreamReference,
}

#[async_trait]
impl ThumbnailSource for WindowsThumbnail {
    async fn read(&self) -> Result<Vec<u8>, NowPlayingError> {
        let reference = self.reference.clone();
        blocking(move || {
            let stream = block_on_operation(reference.OpenReadAsync()?)?;
            let input = stream.GetInputStreamAt(0)?;
            let reader = DataReader::CreateDataReader(&input)?;
            reader.SetInputStreamOptions(InputStreamOptions::Partial)?;

            let buffer = read_sized(stream.Size()?, || {
                let loaded = block_on_operation(reader.LoadAsync(READ_CHUNK)?)?;
                let mut chunk = vec![0u8; loaded as usize];
                reader.ReadBytes(&mut chunk)?;
                Ok(chunk)
            })?;
            debug!("read {} thumbnail bytes", buffer.len());
            Ok(buffer)
        })
        .await
    }
}
