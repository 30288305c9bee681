use std::collections::BTreeMap;

use crate::engine::{RenderMode, RtcEngine, VideoCanvas};
use crate::errors::QuickstartError;
use crate::events::Uid;
use crate::surfaces::{SurfaceAllocator, SurfaceHost, SurfaceId, VideoContainer};

/// The single local preview surface.
#[derive(Debug, Default)]
pub struct LocalVideo {
    surface: Option<SurfaceId>,
}

impl LocalVideo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Create the local surface, bind it as the local sink and start the
    /// camera preview.
    pub fn setup(
        &mut self,
        surfaces: &SurfaceAllocator,
        host: &mut dyn SurfaceHost,
        engine: &mut dyn RtcEngine,
        render_mode: RenderMode,
    ) -> Result<SurfaceId, QuickstartError> {
        if let Some(existing) = self.surface {
            tracing::debug!("local video already set up on {existing:?}");
            return Ok(existing);
        }

        let surface = surfaces.allocate();
        host.create_surface(surface);
        host.add_to_container(VideoContainer::Local, surface);

        let started = engine
            .setup_local_video(VideoCanvas {
                surface,
                render_mode,
                uid: 0,
            })
            .and_then(|()| engine.start_preview());
        if let Err(e) = started {
            host.remove_from_container(VideoContainer::Local, surface);
            return Err(e);
        }

        self.surface = Some(surface);
        tracing::info!(surface = surface.0, "local preview started");
        Ok(surface)
    }

    pub fn release(&mut self, host: &mut dyn SurfaceHost) {
        if let Some(surface) = self.surface.take() {
            host.remove_from_container(VideoContainer::Local, surface);
        }
    }
}

/// One remote surface per participant.
#[derive(Debug, Default)]
pub struct RemoteVideoBinder {
    surfaces: BTreeMap<Uid, SurfaceId>,
}

impl RemoteVideoBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and bind a surface for `uid`, layered above the local preview.
    ///
    /// Returns `None` when `uid` already has a surface. When the engine
    /// rejects the canvas the surface is taken out of the container again and
    /// `uid` stays unbound.
    pub fn bind(
        &mut self,
        uid: Uid,
        surfaces: &SurfaceAllocator,
        host: &mut dyn SurfaceHost,
        engine: &mut dyn RtcEngine,
        render_mode: RenderMode,
    ) -> Result<Option<SurfaceId>, QuickstartError> {
        if let Some(existing) = self.surfaces.get(&uid) {
            tracing::debug!(uid, "remote video already bound to {existing:?}");
            return Ok(None);
        }

        let surface = surfaces.allocate();
        host.create_surface(surface);
        host.set_media_overlay(surface, true);
        host.add_to_container(VideoContainer::Remote, surface);

        // Only a surface the engine accepted counts as bound, so a later
        // UserJoined for the same uid can retry.
        if let Err(e) = engine.setup_remote_video(VideoCanvas {
            surface,
            render_mode,
            uid,
        }) {
            host.remove_from_container(VideoContainer::Remote, surface);
            return Err(e);
        }
        self.surfaces.insert(uid, surface);

        tracing::info!(uid, surface = surface.0, "remote video bound");
        Ok(Some(surface))
    }

    /// Drop the surface for a departed participant.
    ///
    /// The engine binding is removed only when an engine is still around.
    pub fn release(
        &mut self,
        uid: Uid,
        host: &mut dyn SurfaceHost,
        engine: Option<&mut dyn RtcEngine>,
    ) -> Option<SurfaceId> {
        let surface = self.surfaces.remove(&uid)?;
        if let Some(engine) = engine {
            if let Err(e) = engine.remove_remote_video(uid) {
                tracing::warn!(uid, "remove remote video: {e}");
            }
        }
        host.remove_from_container(VideoContainer::Remote, surface);
        tracing::info!(uid, surface = surface.0, "remote video released");
        Some(surface)
    }

    pub fn release_all(&mut self, host: &mut dyn SurfaceHost) {
        for (_, surface) in std::mem::take(&mut self.surfaces) {
            host.remove_from_container(VideoContainer::Remote, surface);
        }
    }

    pub fn surface_for(&self, uid: Uid) -> Option<SurfaceId> {
        self.surfaces.get(&uid).copied()
    }

    pub fn uids(&self) -> Vec<Uid> {
        self.surfaces.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EngineFactory};
    use crate::events;
    use crate::testing::{EngineCall, HostCall, RecordingFactory, RecordingHost};

    fn engine(factory: &RecordingFactory) -> Box<dyn RtcEngine> {
        let (tx, _rx) = events::channel();
        factory
            .create(EngineConfig {
                app_id: "app".into(),
                events: tx,
            })
            .unwrap()
    }

    #[test]
    fn local_setup_binds_fit_canvas_then_starts_preview() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut local = LocalVideo::new();

        let surface = local
            .setup(&alloc, &mut host, engine.as_mut(), RenderMode::Fit)
            .unwrap();

        assert_eq!(host.surfaces_in(VideoContainer::Local), vec![surface]);
        assert_eq!(
            factory.calls(),
            vec![
                EngineCall::SetupLocalVideo(VideoCanvas {
                    surface,
                    render_mode: RenderMode::Fit,
                    uid: 0,
                }),
                EngineCall::StartPreview,
            ]
        );
    }

    #[test]
    fn local_setup_twice_keeps_one_surface() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut local = LocalVideo::new();

        let first = local.setup(&alloc, &mut host, engine.as_mut(), RenderMode::Fit).unwrap();
        let second = local.setup(&alloc, &mut host, engine.as_mut(), RenderMode::Fit).unwrap();

        assert_eq!(first, second);
        assert_eq!(host.surfaces_in(VideoContainer::Local).len(), 1);
    }

    #[test]
    fn remote_bind_creates_overlay_surface() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut binder = RemoteVideoBinder::new();

        let surface = binder
            .bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit)
            .unwrap()
            .unwrap();

        assert_eq!(binder.surface_for(7), Some(surface));
        assert!(host.is_overlay(surface));
        assert_eq!(host.surfaces_in(VideoContainer::Remote), vec![surface]);
        assert_eq!(
            factory.calls(),
            vec![EngineCall::SetupRemoteVideo(VideoCanvas {
                surface,
                render_mode: RenderMode::Fit,
                uid: 7,
            })]
        );
    }

    #[test]
    fn duplicate_bind_is_ignored() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut binder = RemoteVideoBinder::new();

        binder.bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit).unwrap();
        let again = binder.bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit).unwrap();

        assert_eq!(again, None);
        assert_eq!(binder.len(), 1);
        assert_eq!(host.surfaces_in(VideoContainer::Remote).len(), 1);
    }

    #[test]
    fn release_removes_surface_and_binding() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut binder = RemoteVideoBinder::new();

        let surface = binder
            .bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit)
            .unwrap()
            .unwrap();
        let released = binder.release(7, &mut host, Some(engine.as_mut()));

        assert_eq!(released, Some(surface));
        assert!(binder.is_empty());
        assert!(host.surfaces_in(VideoContainer::Remote).is_empty());
        assert_eq!(factory.calls().last(), Some(&EngineCall::RemoveRemoteVideo(7)));
        assert_eq!(binder.release(7, &mut host, None), None);
    }

    #[test]
    fn rejected_remote_canvas_leaves_uid_unbound() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut binder = RemoteVideoBinder::new();

        factory.fail_next_setup_remote();
        let err = binder
            .bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit)
            .unwrap_err();
        assert!(matches!(err, QuickstartError::Engine(_)));
        assert_eq!(binder.surface_for(7), None);
        assert!(host.surfaces_in(VideoContainer::Remote).is_empty());

        let retry = binder
            .bind(7, &alloc, &mut host, engine.as_mut(), RenderMode::Fit)
            .unwrap()
            .unwrap();
        assert_eq!(binder.surface_for(7), Some(retry));
        assert_eq!(host.surfaces_in(VideoContainer::Remote), vec![retry]);
    }

    #[test]
    fn failed_preview_leaves_no_local_surface() {
        let factory = RecordingFactory::new();
        factory.fail_start_preview();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut local = LocalVideo::new();

        assert!(local.setup(&alloc, &mut host, engine.as_mut(), RenderMode::Fit).is_err());
        assert_eq!(local.surface(), None);
        assert!(host.surfaces_in(VideoContainer::Local).is_empty());
    }

    #[test]
    fn release_all_clears_container() {
        let factory = RecordingFactory::new();
        let mut engine = engine(&factory);
        let mut host = RecordingHost::new();
        let alloc = SurfaceAllocator::new();
        let mut binder = RemoteVideoBinder::new();

        for uid in [1, 2, 3] {
            binder.bind(uid, &alloc, &mut host, engine.as_mut(), RenderMode::Hidden).unwrap();
        }
        assert_eq!(binder.uids(), vec![1, 2, 3]);

        binder.release_all(&mut host);
        assert!(binder.is_empty());
        assert!(host.surfaces_in(VideoContainer::Remote).is_empty());
        assert!(host
            .calls()
            .iter()
            .all(|c| !matches!(c, HostCall::Remove(VideoContainer::Local, _))));
    }
}
