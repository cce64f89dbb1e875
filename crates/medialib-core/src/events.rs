//! Media library events and their dispatch.
//!
//! Listeners run synchronously on the task that raised the event, so they must
//! not block. [`ChannelListener`] forwards to an async consumer instead.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::models::{Conversion, Media, OwnerRef};

#[derive(Debug, Clone)]
pub enum MediaLibraryEvent {
    MediaHasBeenAdded {
        media: Media,
    },
    ConversionWillStart {
        media: Media,
        conversion: Conversion,
        copied_original_file: String,
    },
    ConversionHasBeenCompleted {
        media: Media,
        conversion: Conversion,
    },
    CollectionHasBeenCleared {
        collection_name: String,
        owner: Option<OwnerRef>,
    },
    ResponsiveImagesGenerated {
        media: Media,
    },
}

impl MediaLibraryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MediaLibraryEvent::MediaHasBeenAdded { .. } => "media_has_been_added",
            MediaLibraryEvent::ConversionWillStart { .. } => "conversion_will_start",
            MediaLibraryEvent::ConversionHasBeenCompleted { .. } => "conversion_has_been_completed",
            MediaLibraryEvent::CollectionHasBeenCleared { .. } => "collection_has_been_cleared",
            MediaLibraryEvent::ResponsiveImagesGenerated { .. } => "responsive_images_generated",
        }
    }

    pub fn media(&self) -> Option<&Media> {
        match self {
            MediaLibraryEvent::MediaHasBeenAdded { media }
            | MediaLibraryEvent::ConversionWillStart { media, .. }
            | MediaLibraryEvent::ConversionHasBeenCompleted { media, .. }
            | MediaLibraryEvent::ResponsiveImagesGenerated { media } => Some(media),
            MediaLibraryEvent::CollectionHasBeenCleared { .. } => None,
        }
    }
}

pub trait MediaLibraryListener: Send + Sync {
    fn handle(&self, event: &MediaLibraryEvent);
}

impl<F> MediaLibraryListener for F
where
    F: Fn(&MediaLibraryEvent) + Send + Sync,
{
    fn handle(&self, event: &MediaLibraryEvent) {
        self(event)
    }
}

/// Forwards events to an unbounded channel; a closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<MediaLibraryEvent>,
}

impl ChannelListener {
    pub fn new(sender: mpsc::UnboundedSender<MediaLibraryEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MediaLibraryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl MediaLibraryListener for ChannelListener {
    fn handle(&self, event: &MediaLibraryEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(event = event.name(), "Event receiver closed, dropping event");
        }
    }
}

#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<Arc<dyn MediaLibraryListener>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, listener: Arc<dyn MediaLibraryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn dispatch(&self, event: MediaLibraryEvent) {
        let listeners: Vec<Arc<dyn MediaLibraryListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        tracing::trace!(event = event.name(), listeners = listeners.len(), "Dispatching event");
        for listener in listeners {
            listener.handle(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
