//! Observer tests against a scripted media session and a local relay.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use nowplaying_core::{
    Frame, FrameCodec, NormalizeOptions, NowPlayingError, PlaybackStatus, read_frame,
};
use nowplaying_sender::media::{
    InMemoryThumbnail, MediaProperties, MediaSession, MediaSessionManager, SessionEvent,
    SessionNotifier, Subscription, ThumbnailSource,
};
use nowplaying_sender::observer::{ObserverState, PlaybackObserver, RefreshPipeline};
use nowplaying_sender::transport::FrameSender;

// ── Fakes ────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeSession {
    props: Mutex<MediaProperties>,
    status: Mutex<PlaybackStatus>,
    fail_props: AtomicBool,
    notifier: Mutex<Option<SessionNotifier>>,
    subscribed: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl FakeSession {
    fn playing(title: &str, artist: &str, thumbnail: Option<Vec<u8>>) -> Arc<Self> {
        let session = Self::default();
        *session.status.lock().unwrap() = PlaybackStatus::Playing;
        *session.props.lock().unwrap() = MediaProperties {
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            thumbnail: thumbnail.map(|bytes| Arc::new(InMemoryThumbnail(bytes)) as Arc<dyn ThumbnailSource>),
        };
        Arc::new(session)
    }

    /// Fire a callback the way the OS does: from a thread we do not own.
    fn fire(&self, event: SessionEvent) {
        let notifier = self.notifier.lock().unwrap().clone().expect("not subscribed");
        std::thread::spawn(move || notifier.notify(event))
            .join()
            .unwrap();
    }
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn try_get_media_properties(&self) -> Result<MediaProperties, NowPlayingError> {
        if self.fail_props.load(Ordering::SeqCst) {
            return Err(NowPlayingError::source("session went away"));
        }
        Ok(self.props.lock().unwrap().clone())
    }

    fn get_playback_info(&self) -> Result<PlaybackStatus, NowPlayingError> {
        Ok(*self.status.lock().unwrap())
    }

    fn subscribe(&self, notifier: SessionNotifier) -> Result<Subscription, NowPlayingError> {
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        *self.notifier.lock().unwrap() = Some(notifier);
        let released = Arc::clone(&self.released);
        Ok(Subscription::new(move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

struct FakeManager(Option<Arc<FakeSession>>);

#[async_trait]
impl MediaSessionManager for FakeManager {
    async fn request_current_session(
        &self,
    ) -> Result<Option<Arc<dyn MediaSession>>, NowPlayingError> {
        Ok(self.0.clone().map(|s| s as Arc<dyn MediaSession>))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

async fn relay() -> (TcpListener, FrameSender) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sender = FrameSender::new(
        listener.local_addr().unwrap().to_string(),
        Duration::from_secs(2),
    );
    (listener, sender)
}

async fn next_frame(listener: &TcpListener) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), async {
        let (stream, _) = listener.accept().await.unwrap();
        read_frame(stream, FrameCodec::new()).await.unwrap().unwrap()
    })
    .await
    .expect("no frame reached the relay")
}

fn observer(session: Option<Arc<FakeSession>>, sender: FrameSender) -> PlaybackObserver {
    let pipeline = RefreshPipeline::new(sender, NormalizeOptions::default());
    PlaybackObserver::new(Arc::new(FakeManager(session)), pipeline)
}

// ── Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn start_pushes_current_state_once() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("Song A", "Artist A", Some(png(100, 100)));
    let mut obs = observer(Some(Arc::clone(&session)), sender);

    let (state, frame) = tokio::join!(obs.start(), next_frame(&listener));
    assert_eq!(state.unwrap(), ObserverState::Subscribed);
    assert_eq!(obs.state(), ObserverState::Subscribed);

    assert_eq!(
        frame.header_text,
        r#"{"status":"Playing","title":"Song A","artist":"Artist A","album":"","image_len":153600,"width":320,"height":240}"#
    );
    let header: serde_json::Value = serde_json::from_str(&frame.header_text).unwrap();
    assert_eq!(header["status"], "Playing");
    assert_eq!(header["image_len"], 153_600);
    assert_eq!((header["width"].as_u64(), header["height"].as_u64()), (Some(320), Some(240)));

    assert!(frame.has_full_canvas());
    assert_eq!(frame.label_text(), "Song A\nArtist A");
}

#[tokio::test]
async fn no_active_session_stays_idle() {
    let (_listener, sender) = relay().await;
    let mut obs = observer(None, sender);
    assert_eq!(obs.start().await.unwrap(), ObserverState::Idle);
    assert_eq!(obs.state(), ObserverState::Idle);
    // Stopping an observer that never subscribed is a no-op.
    obs.stop();
    assert_eq!(obs.state(), ObserverState::Idle);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("T", "A", None);
    let mut obs = observer(Some(Arc::clone(&session)), sender);

    let (state, _) = tokio::join!(obs.start(), next_frame(&listener));
    assert_eq!(state.unwrap(), ObserverState::Subscribed);

    obs.stop();
    obs.stop();
    assert_eq!(obs.state(), ObserverState::Idle);
    assert_eq!(session.released.load(Ordering::SeqCst), 1);

    drop(obs);
    assert_eq!(session.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_start_does_not_resubscribe() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("T", "A", None);
    let mut obs = observer(Some(Arc::clone(&session)), sender);

    let (first, _) = tokio::join!(obs.start(), next_frame(&listener));
    assert_eq!(first.unwrap(), ObserverState::Subscribed);
    assert_eq!(obs.start().await.unwrap(), ObserverState::Subscribed);
    assert_eq!(session.subscribed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undecodable_art_still_sends_metadata() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("Song B", "Artist B", Some(b"not an image".to_vec()));
    let pipeline = RefreshPipeline::new(sender, NormalizeOptions::default());

    let (sent, frame) = tokio::join!(pipeline.refresh(session.as_ref()), next_frame(&listener));
    let sent = sent.unwrap();
    assert_eq!(sent.image_len, 0);
    assert_eq!(frame.message.title, "Song B");
    assert!(frame.payload.is_empty());
    assert!(!frame.is_truncated());
}

#[tokio::test]
async fn refresh_failure_keeps_subscription() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("T", "A", None);
    let mut obs = observer(Some(Arc::clone(&session)), sender.clone());
    let (state, _) = tokio::join!(obs.start(), next_frame(&listener));
    assert_eq!(state.unwrap(), ObserverState::Subscribed);

    session.fail_props.store(true, Ordering::SeqCst);
    let pipeline = RefreshPipeline::new(sender, NormalizeOptions::default());
    assert!(pipeline.refresh(session.as_ref()).await.is_err());

    assert_eq!(obs.state(), ObserverState::Subscribed);
    assert_eq!(session.released.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preview_receives_raw_thumbnail() {
    let (listener, sender) = relay().await;
    let art = png(8, 8);
    let session = FakeSession::playing("T", "A", Some(art.clone()));
    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    let pipeline = RefreshPipeline::new(sender, NormalizeOptions::default()).with_preview(tx);

    let (sent, _) = tokio::join!(pipeline.refresh(session.as_ref()), next_frame(&listener));
    sent.unwrap();
    assert_eq!(rx.try_recv().unwrap(), art);
}

#[tokio::test]
async fn foreign_thread_callbacks_drive_refreshes() {
    let (listener, sender) = relay().await;
    let session = FakeSession::playing("First", "Artist", None);
    let obs = observer(Some(Arc::clone(&session)), sender);

    let shutdown = CancellationToken::new();
    let worker = obs.spawn_worker(shutdown.clone()).unwrap();

    let initial = next_frame(&listener).await;
    assert_eq!(initial.message.title, "First");

    session.props.lock().unwrap().title = "Second".into();
    *session.status.lock().unwrap() = PlaybackStatus::Paused;
    session.fire(SessionEvent::PlaybackInfoChanged);

    let update = next_frame(&listener).await;
    assert_eq!(update.message.title, "Second");
    assert_eq!(update.message.status, PlaybackStatus::Paused);

    shutdown.cancel();
    tokio::task::spawn_blocking(move || worker.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.released.load(Ordering::SeqCst), 1);
}
