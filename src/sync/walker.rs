//! Recursive traversal of the remote tree.
//!
//! The same walk runs twice per sync: once to add up file sizes, once to
//! download every file into the run's archive. Siblings are visited
//! concurrently; a directory completes only after all of its children have.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use tracing::{debug, instrument, trace, warn};

use super::connection::ConnectionProfile;
use super::context::RunContext;
use super::error::SyncError;
use super::progress::Phase;
use crate::archive::FolderPath;
use crate::portal::{ListOutcome, NodeKind, Portal, PortalEndpoints, RemoteNode};

/// Walks one remote tree on behalf of a run.
pub(crate) struct TreeWalker<'a> {
    portal: &'a dyn Portal,
    endpoints: &'a PortalEndpoints,
    profile: &'a ConnectionProfile,
    run: &'a RunContext,
}

impl<'a> TreeWalker<'a> {
    pub(crate) fn new(
        portal: &'a dyn Portal,
        endpoints: &'a PortalEndpoints,
        profile: &'a ConnectionProfile,
        run: &'a RunContext,
    ) -> Self {
        Self {
            portal,
            endpoints,
            profile,
            run,
        }
    }

    /// Adds the declared size of every non-link file below `root` to the
    /// planned counter and returns the total.
    #[instrument(level = "debug", skip_all, fields(run = self.run.id(), root = %root.code))]
    pub(crate) async fn count(&self, root: &RemoteNode) -> Result<u64, SyncError> {
        self.walk(root, Phase::Count, FolderPath::default()).await?;
        Ok(self.run.progress().snapshot().planned_size)
    }

    /// Downloads every non-link file below `root` into the run's archive and
    /// returns the downloaded total.
    #[instrument(level = "debug", skip_all, fields(run = self.run.id(), root = %root.code))]
    pub(crate) async fn download(&self, root: &RemoteNode) -> Result<u64, SyncError> {
        let root_folder = self.run.archive().root();
        self.walk(root, Phase::Download, root_folder).await?;
        Ok(self.run.progress().snapshot().downloaded_size)
    }

    fn walk<'w>(
        &'w self,
        node: &'w RemoteNode,
        phase: Phase,
        parent: FolderPath,
    ) -> BoxFuture<'w, Result<(), SyncError>> {
        async move {
            if node.link {
                debug!(code = %node.code, name = %node.name, "skipping link");
                return Ok(());
            }
            match node.kind {
                NodeKind::File => self.visit_file(node, phase, &parent).await,
                NodeKind::Dir => self.visit_dir(node, phase, &parent).await,
                NodeKind::Unknown => {
                    warn!(code = %node.code, name = %node.name, "skipping node of unknown type");
                    Ok(())
                }
            }
        }
        .boxed()
    }

    async fn visit_file(
        &self,
        node: &RemoteNode,
        phase: Phase,
        parent: &FolderPath,
    ) -> Result<(), SyncError> {
        if phase == Phase::Count {
            self.run.progress().record(Phase::Count, node.size);
            return Ok(());
        }

        let url = self.endpoints.file_url(self.profile.code(), &node.code);
        let response = self
            .run
            .guarded(async { self.portal.fetch_file(&url).await.map_err(SyncError::from) })
            .await?;

        if response.redirected && self.endpoints.is_identity_redirect(&response.final_url) {
            warn!(name = %node.name, "download redirected to identity provider");
            return Err(SyncError::SessionExpired {
                name: node.name.clone(),
            });
        }
        if !response.is_success() {
            return Err(SyncError::download(node.name.as_str(), response.status));
        }

        trace!(name = %node.name, bytes = response.body.len(), "file downloaded");
        self.run
            .archive()
            .insert_file(parent, &node.name, response.body);
        self.run.progress().record(Phase::Download, node.size);
        Ok(())
    }

    async fn visit_dir(
        &self,
        node: &RemoteNode,
        phase: Phase,
        parent: &FolderPath,
    ) -> Result<(), SyncError> {
        let folder = match phase {
            Phase::Download => self.run.archive().folder(parent, &node.name),
            Phase::Count => parent.child(&node.name),
        };

        let listing = self
            .run
            .guarded(async {
                self.portal
                    .list(self.profile.list_url(), &node.code)
                    .await
                    .map_err(SyncError::from)
            })
            .await?;

        let children = match listing {
            ListOutcome::Listed(children) => children,
            ListOutcome::Rejected { status } => {
                warn!(path = %folder.as_path(), status, "directory listing rejected");
                return Err(SyncError::traversal(folder.as_path(), status));
            }
        };
        debug!(path = %folder.as_path(), children = children.len(), "directory listed");

        try_join_all(
            children
                .iter()
                .map(|child| self.walk(child, phase, folder.clone())),
        )
        .await?;

        self.run.progress().report_current(phase);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::host::ProgressEvent;
    use crate::sync::connection::ConnectionKind;
    use crate::sync::fake::{Call, FakePortal};
    use crate::sync::progress::ProgressSink;
    use crate::sync::NullSink;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for RecordingSink {
        fn notify(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn profile(endpoints: &PortalEndpoints) -> ConnectionProfile {
        ConnectionProfile::new(ConnectionKind::Material, endpoints)
    }

    fn course_portal(endpoints: &PortalEndpoints) -> FakePortal {
        let list_url = endpoints.material_list_url.clone();
        FakePortal::new()
            .with_listing(
                &list_url,
                "root",
                vec![
                    RemoteNode::file("f1", "intro.pdf", 100),
                    RemoteNode::dir("d1", "Labs"),
                ],
            )
            .with_listing(&list_url, "d1", vec![RemoteNode::file("f2", "lab1.pdf", 250)])
            .with_file(&endpoints.file_url("MATDID", "f1"), vec![1; 100])
            .with_file(&endpoints.file_url("MATDID", "f2"), vec![2; 250])
    }

    #[tokio::test]
    async fn test_count_sums_declared_sizes() {
        let endpoints = PortalEndpoints::default();
        let portal = course_portal(&endpoints);
        let profile = profile(&endpoints);
        let sink = Arc::new(RecordingSink::default());
        let run = RunContext::new(1, sink.clone(), None);

        let total = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .count(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap();

        assert_eq!(total, 350);
        assert!(portal.fetch_calls().is_empty(), "counting never downloads");
        let events = sink.0.lock().unwrap().clone();
        assert!(events.contains(&ProgressEvent::Fetch(100)));
        assert_eq!(events.last(), Some(&ProgressEvent::Fetch(350)));
    }

    #[tokio::test]
    async fn test_download_fills_archive_and_counter() {
        let endpoints = PortalEndpoints::default();
        let portal = course_portal(&endpoints);
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        let total = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap();

        assert_eq!(total, 350);
        let tree = run.archive().take();
        assert_eq!(tree.file_paths(), vec!["Course/Labs/lab1.pdf", "Course/intro.pdf"]);
        assert_eq!(tree.file("Course/intro.pdf").map(<[u8]>::len), Some(100));
    }

    #[tokio::test]
    async fn test_links_are_skipped_at_any_depth() {
        let endpoints = PortalEndpoints::default();
        let list_url = endpoints.material_list_url.clone();
        let portal = FakePortal::new()
            .with_listing(
                &list_url,
                "root",
                vec![
                    RemoteNode::file("l1", "Moodle", 999).as_link(),
                    RemoteNode::dir("d1", "Sub"),
                    RemoteNode::dir("l2", "Shortcut").as_link(),
                ],
            )
            .with_listing(
                &list_url,
                "d1",
                vec![
                    RemoteNode::file("l3", "Video", 500).as_link(),
                    RemoteNode::file("f1", "notes.txt", 7),
                ],
            )
            .with_file(&endpoints.file_url("MATDID", "f1"), b"content".to_vec());
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);
        let walker = TreeWalker::new(&portal, &endpoints, &profile, &run);
        let root = RemoteNode::dir("root", "Course");

        assert_eq!(walker.count(&root).await.unwrap(), 7);
        assert_eq!(walker.download(&root).await.unwrap(), 7);
        assert_eq!(portal.fetch_calls(), vec![endpoints.file_url("MATDID", "f1")]);
        assert!(
            !portal.list_calls().iter().any(|(_, code)| code == "l2"),
            "linked directories are never listed"
        );
    }

    #[tokio::test]
    async fn test_failed_child_listing_aborts_with_directory_name() {
        let endpoints = PortalEndpoints::default();
        let list_url = endpoints.material_list_url.clone();
        let portal = FakePortal::new()
            .with_listing(&list_url, "root", vec![RemoteNode::dir("d1", "Esercitazioni")])
            .with_rejected_listing(&list_url, "d1", 500);
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        let error = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .count(&RemoteNode::dir("root", "Fisica I"))
            .await
            .unwrap_err();

        assert!(matches!(
            &error,
            SyncError::Traversal { path, status: 500 } if path == "Fisica I/Esercitazioni"
        ));
        assert!(error.to_string().contains("Esercitazioni"));
    }

    #[tokio::test]
    async fn test_failed_child_listing_wins_over_healthy_sibling() {
        let endpoints = PortalEndpoints::default();
        let list_url = endpoints.material_list_url.clone();
        let portal = FakePortal::new()
            .with_listing(
                &list_url,
                "root",
                vec![
                    RemoteNode::dir("d0", "Lezioni"),
                    RemoteNode::dir("d1", "Esercitazioni"),
                ],
            )
            .with_listing(&list_url, "d0", vec![])
            .with_rejected_listing(&list_url, "d1", 500);
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        let error = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap_err();

        assert!(matches!(
            &error,
            SyncError::Traversal { path, status: 500 } if path == "Course/Esercitazioni"
        ));
        assert!(portal.list_calls().iter().any(|(_, code)| code == "d0"));
    }

    #[tokio::test]
    async fn test_failed_download_reports_file_and_status() {
        let endpoints = PortalEndpoints::default();
        let portal = FakePortal::new().with_listing(
            &endpoints.material_list_url,
            "root",
            vec![RemoteNode::file("missing", "gone.pdf", 10)],
        );
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        let error = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap_err();
        assert!(matches!(
            &error,
            SyncError::Download { name, status: 404 } if name == "gone.pdf"
        ));
    }

    #[tokio::test]
    async fn test_identity_redirect_mid_download_is_session_expiry() {
        let endpoints = PortalEndpoints::default();
        let portal = FakePortal::new()
            .with_listing(
                &endpoints.material_list_url,
                "root",
                vec![RemoteNode::file("f1", "a.pdf", 3)],
            )
            .with_redirect(
                &endpoints.file_url("MATDID", "f1"),
                &endpoints.identity_redirect_url,
                b"<html></html>".to_vec(),
            );
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        let error = TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap_err();
        assert!(matches!(&error, SyncError::SessionExpired { name } if name == "a.pdf"));
        assert_eq!(run.archive().file_count(), 0);
    }

    fn two_file_portal(endpoints: &PortalEndpoints) -> FakePortal {
        FakePortal::new()
            .with_listing(
                &endpoints.material_list_url,
                "root",
                vec![
                    RemoteNode::file("a", "a.txt", 1),
                    RemoteNode::file("b", "b.txt", 1),
                ],
            )
            .with_file(&endpoints.file_url("MATDID", "a"), b"a".to_vec())
            .with_file(&endpoints.file_url("MATDID", "b"), b"b".to_vec())
    }

    #[tokio::test]
    async fn test_siblings_are_fetched_concurrently() {
        let endpoints = PortalEndpoints::default();
        let portal = two_file_portal(&endpoints);
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), None);

        TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap();

        let calls = portal.calls();
        let first_end = calls
            .iter()
            .position(|call| matches!(call, Call::FetchEnd(_)))
            .unwrap();
        let starts_before_end = calls[..first_end]
            .iter()
            .filter(|call| matches!(call, Call::FetchStart(_)))
            .count();
        assert_eq!(starts_before_end, 2, "both downloads start before either ends");
    }

    #[tokio::test]
    async fn test_in_flight_cap_serializes_requests() {
        let endpoints = PortalEndpoints::default();
        let portal = two_file_portal(&endpoints);
        let profile = profile(&endpoints);
        let run = RunContext::new(1, Arc::new(NullSink), Some(1));

        TreeWalker::new(&portal, &endpoints, &profile, &run)
            .download(&RemoteNode::dir("root", "Course"))
            .await
            .unwrap();

        let fetches: Vec<Call> = portal
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::FetchStart(_) | Call::FetchEnd(_)))
            .collect();
        let a = endpoints.file_url("MATDID", "a");
        let b = endpoints.file_url("MATDID", "b");
        assert_eq!(
            fetches,
            vec![
                Call::FetchStart(a.clone()),
                Call::FetchEnd(a),
                Call::FetchStart(b.clone()),
                Call::FetchEnd(b),
            ]
        );
    }
}
