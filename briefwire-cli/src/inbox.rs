//! Client-side inbox cache and reconciler.
//!
//! Holds one paginated cache per category plus the per-category unread
//! counters and the per-conversation unread map derived from unread
//! message-category notifications. All mutation happens through `&mut self`,
//! so ownership by a single task (or direct user actions) is enforced at
//! compile time; stream events arrive as refresh triggers, never as
//! positioned updates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use shared::config::server::NotificationsConfig;
use shared::models::{
    EntityKind, NotificationCategory, NotificationListResponse, NotificationPush,
    NotificationView, Timestamp,
};
use tracing::warn;
use uuid::Uuid;

use crate::api::{ApiClient, ClientResult};

/// Inbox API surface the store needs; a seam for tests.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(
        &self,
        category: Option<NotificationCategory>,
        cursor: Option<String>,
        limit: i64,
        unread_only: bool,
    ) -> ClientResult<NotificationListResponse>;

    async fn unread_count(&self, category: Option<NotificationCategory>) -> ClientResult<i64>;

    async fn mark_read(&self, id: Uuid) -> ClientResult<NotificationView>;

    async fn mark_unread(&self, id: Uuid) -> ClientResult<NotificationView>;

    async fn mark_all_read(&self, category: Option<NotificationCategory>) -> ClientResult<i64>;
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list(
        &self,
        category: Option<NotificationCategory>,
        cursor: Option<String>,
        limit: i64,
        unread_only: bool,
    ) -> ClientResult<NotificationListResponse> {
        self.list_notifications(category, cursor.as_deref(), limit, unread_only)
            .await
    }

    async fn unread_count(&self, category: Option<NotificationCategory>) -> ClientResult<i64> {
        ApiClient::unread_count(self, category).await
    }

    async fn mark_read(&self, id: Uuid) -> ClientResult<NotificationView> {
        ApiClient::mark_read(self, id).await
    }

    async fn mark_unread(&self, id: Uuid) -> ClientResult<NotificationView> {
        ApiClient::mark_unread(self, id).await
    }

    async fn mark_all_read(&self, category: Option<NotificationCategory>) -> ClientResult<i64> {
        ApiClient::mark_all_read(self, category).await
    }
}

/// Paginated item cache for one category.
#[derive(Debug, Clone)]
pub struct CategoryCache {
    pub items: Vec<NotificationView>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            has_more: true,
            next_cursor: None,
            is_loading: false,
            error: None,
        }
    }
}

impl CategoryCache {
    /// Appends a page, deduplicating by id. Server pages are never assumed
    /// disjoint.
    fn merge_page(&mut self, page: NotificationListResponse) {
        for item in page.items {
            if !self.items.iter().any(|existing| existing.id == item.id) {
                self.items.push(item);
            }
        }
        self.has_more = page.has_more;
        self.next_cursor = page.next_cursor;
    }
}

/// Groups unread message-category notifications by their conversation
/// entity reference.
#[must_use]
pub fn derive_conversation_unread<'a, I>(items: I) -> HashMap<Uuid, i64>
where
    I: IntoIterator<Item = &'a NotificationView>,
{
    let mut map = HashMap::new();
    for item in items {
        if item.category != NotificationCategory::Message || !item.is_unread() {
            continue;
        }
        let Some(entity) = item.entity else { continue };
        if entity.entity_type != EntityKind::Conversation {
            continue;
        }
        *map.entry(entity.entity_id).or_insert(0) += 1;
    }
    map
}

/// Reconciling inbox store.
pub struct InboxStore {
    api: Arc<dyn NotificationApi>,
    page_size: i64,
    scan_pages: u32,
    categories: HashMap<NotificationCategory, CategoryCache>,
    counts: HashMap<NotificationCategory, i64>,
    conversation_unread: HashMap<Uuid, i64>,
}

impl std::fmt::Debug for InboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxStore")
            .field("counts", &self.counts)
            .finish()
    }
}

impl InboxStore {
    #[must_use]
    pub fn new(api: Arc<dyn NotificationApi>, config: &NotificationsConfig) -> Self {
        let categories = NotificationCategory::ALL
            .into_iter()
            .map(|category| (category, CategoryCache::default()))
            .collect();
        let counts = NotificationCategory::ALL
            .into_iter()
            .map(|category| (category, 0))
            .collect();

        Self {
            api,
            page_size: config.default_page_size,
            scan_pages: config.conversation_scan_pages,
            categories,
            counts,
            conversation_unread: HashMap::new(),
        }
    }

    /// Cache snapshot for one category.
    ///
    /// # Panics
    /// Never: every category is seeded at construction.
    #[must_use]
    pub fn category(&self, category: NotificationCategory) -> &CategoryCache {
        self.categories
            .get(&category)
            .expect("all categories are seeded at construction")
    }

    /// Current unread counter for one category.
    #[must_use]
    pub fn unread_count(&self, category: NotificationCategory) -> i64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Per-conversation unread map (message category only).
    #[must_use]
    pub fn conversation_unread(&self) -> &HashMap<Uuid, i64> {
        &self.conversation_unread
    }

    /// Fetches the next page for a category. No-op while a load is in flight
    /// or when the server reported the end of the listing.
    pub async fn load_more(&mut self, category: NotificationCategory) {
        let (cursor, skip) = {
            let cache = self.category(category);
            (
                cache.next_cursor.clone(),
                cache.is_loading || !cache.has_more,
            )
        };
        if skip {
            return;
        }

        self.cache_mut(category).is_loading = true;
        let result = self
            .api
            .list(Some(category), cursor, self.page_size, false)
            .await;

        let cache = self.cache_mut(category);
        cache.is_loading = false;
        match result {
            Ok(page) => {
                cache.error = None;
                cache.merge_page(page);
            }
            Err(err) => {
                warn!(category = category.as_str(), "load_more failed: {err}");
                cache.error = Some(err.to_string());
            }
        }
    }

    /// Replaces a category's cache with a fresh first page.
    pub async fn refresh_category(&mut self, category: NotificationCategory) {
        if self.category(category).is_loading {
            return;
        }

        self.cache_mut(category).is_loading = true;
        let result = self.api.list(Some(category), None, self.page_size, false).await;

        let cache = self.cache_mut(category);
        cache.is_loading = false;
        match result {
            Ok(page) => {
                *cache = CategoryCache::default();
                cache.merge_page(page);
            }
            Err(err) => {
                warn!(category = category.as_str(), "refresh failed: {err}");
                cache.error = Some(err.to_string());
            }
        }
    }

    /// Refreshes every category counter with one concurrent call each.
    pub async fn refresh_counts(&mut self) {
        let calls = NotificationCategory::ALL.into_iter().map(|category| {
            let api = Arc::clone(&self.api);
            async move { (category, api.unread_count(Some(category)).await) }
        });

        for (category, result) in join_all(calls).await {
            match result {
                Ok(count) => {
                    self.counts.insert(category, count);
                }
                Err(err) => {
                    warn!(category = category.as_str(), "count refresh failed: {err}");
                }
            }
        }
    }

    /// Refreshes one category counter.
    pub async fn refresh_count(&mut self, category: NotificationCategory) {
        match self.api.unread_count(Some(category)).await {
            Ok(count) => {
                self.counts.insert(category, count);
            }
            Err(err) => {
                warn!(category = category.as_str(), "count refresh failed: {err}");
            }
        }
    }

    /// Rebuilds the per-conversation unread map by scanning unread message
    /// notifications, bounded to a fixed number of pages to cap cost.
    pub async fn refresh_conversation_unread(&mut self) {
        let mut scanned: Vec<NotificationView> = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.scan_pages {
            let page = match self
                .api
                .list(
                    Some(NotificationCategory::Message),
                    cursor.clone(),
                    self.page_size,
                    true,
                )
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!("conversation unread scan failed: {err}");
                    return;
                }
            };

            scanned.extend(page.items);
            cursor = page.next_cursor;
            if !page.has_more || cursor.is_none() {
                break;
            }
        }

        self.conversation_unread = derive_conversation_unread(scanned.iter());
    }

    /// Marks one notification read; local state is only touched after the
    /// server call succeeds.
    pub async fn mark_read(&mut self, id: Uuid) -> ClientResult<()> {
        let view = self.api.mark_read(id).await?;
        self.apply_read_state(&view, true);
        Ok(())
    }

    /// Marks one notification unread; local state is only touched after the
    /// server call succeeds.
    pub async fn mark_unread(&mut self, id: Uuid) -> ClientResult<()> {
        let view = self.api.mark_unread(id).await?;
        self.apply_read_state(&view, false);
        Ok(())
    }

    /// Bulk-marks a category (or everything) read.
    pub async fn mark_all_read(
        &mut self,
        category: Option<NotificationCategory>,
    ) -> ClientResult<i64> {
        let updated = self.api.mark_all_read(category).await?;

        let targets: Vec<NotificationCategory> = match category {
            Some(category) => vec![category],
            None => NotificationCategory::ALL.to_vec(),
        };

        let stamp = Timestamp::now();
        for target in targets {
            self.counts.insert(target, 0);
            let cache = self.cache_mut(target);
            for item in &mut cache.items {
                if item.read_at.is_none() {
                    item.read_at = Some(stamp.clone());
                }
            }
        }

        self.rederive_conversation_unread_from_cache();
        Ok(updated)
    }

    /// Entry point for stream events: refresh the named category's list and
    /// counter, and the conversation map when messages changed. Always
    /// re-fetch; a stream event only means "something changed here."
    pub async fn handle_stream_event(&mut self, push: &NotificationPush) {
        self.refresh_category(push.category).await;
        self.refresh_count(push.category).await;
        if push.category == NotificationCategory::Message {
            self.refresh_conversation_unread().await;
        }
    }

    fn apply_read_state(&mut self, view: &NotificationView, now_read: bool) {
        let cache = self.cache_mut(view.category);
        let mut was_unread = false;
        let mut found = false;
        for item in &mut cache.items {
            if item.id == view.id {
                was_unread = item.read_at.is_none();
                item.read_at = view.read_at.clone();
                found = true;
                break;
            }
        }

        let delta = match (found, was_unread, now_read) {
            (true, true, true) => -1,
            (true, false, false) => 1,
            // Already in the target state, or not cached. Uncached rows have
            // an unknown previous state; their counter moves on the next
            // refresh instead.
            _ => 0,
        };

        if found {
            let entry = self.counts.entry(view.category).or_insert(0);
            *entry = (*entry + delta).max(0);
        }

        if view.category == NotificationCategory::Message {
            self.rederive_conversation_unread_from_cache();
        }
    }

    fn rederive_conversation_unread_from_cache(&mut self) {
        let items = self
            .categories
            .get(&NotificationCategory::Message)
            .map(|cache| cache.items.clone())
            .unwrap_or_default();
        self.conversation_unread = derive_conversation_unread(items.iter());
    }

    fn cache_mut(&mut self, category: NotificationCategory) -> &mut CategoryCache {
        self.categories.entry(category).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::EntityRef;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn view(category: NotificationCategory, conversation: Option<Uuid>) -> NotificationView {
        NotificationView {
            id: Uuid::new_v4(),
            category,
            title: "title".into(),
            body: "body".into(),
            link: None,
            entity: conversation.map(|id| EntityRef {
                entity_type: EntityKind::Conversation,
                entity_id: id,
            }),
            metadata: serde_json::Value::Null,
            created_at: Timestamp::now(),
            read_at: None,
        }
    }

    fn page(
        items: Vec<NotificationView>,
        has_more: bool,
        next_cursor: Option<&str>,
    ) -> NotificationListResponse {
        NotificationListResponse {
            items,
            has_more,
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    /// Scripted API: pages pop in order per (category, unreadOnly) key.
    struct MockApi {
        pages: Mutex<HashMap<String, Vec<NotificationListResponse>>>,
        counts: Mutex<HashMap<NotificationCategory, i64>>,
        mark_category: Mutex<NotificationCategory>,
        list_calls: AtomicUsize,
        count_calls: AtomicUsize,
    }

    impl Default for MockApi {
        fn default() -> Self {
            Self {
                pages: Mutex::new(HashMap::new()),
                counts: Mutex::new(HashMap::new()),
                mark_category: Mutex::new(NotificationCategory::Message),
                list_calls: AtomicUsize::new(0),
                count_calls: AtomicUsize::new(0),
            }
        }
    }

    impl MockApi {
        fn key(category: Option<NotificationCategory>, unread_only: bool) -> String {
            let name = category.map_or("all", NotificationCategory::as_str);
            format!("{name}:{}", if unread_only { "unread" } else { "any" })
        }

        fn script(
            &self,
            category: NotificationCategory,
            unread_only: bool,
            scripted: Vec<NotificationListResponse>,
        ) {
            self.pages
                .lock()
                .unwrap()
                .insert(Self::key(Some(category), unread_only), scripted);
        }

        fn set_count(&self, category: NotificationCategory, count: i64) {
            self.counts.lock().unwrap().insert(category, count);
        }

        fn set_mark_category(&self, category: NotificationCategory) {
            *self.mark_category.lock().unwrap() = category;
        }
    }

    #[async_trait]
    impl NotificationApi for MockApi {
        async fn list(
            &self,
            category: Option<NotificationCategory>,
            _cursor: Option<String>,
            _limit: i64,
            unread_only: bool,
        ) -> ClientResult<NotificationListResponse> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.pages.lock().unwrap();
            let scripted = guard.entry(Self::key(category, unread_only)).or_default();
            if scripted.is_empty() {
                Ok(page(Vec::new(), false, None))
            } else {
                Ok(scripted.remove(0))
            }
        }

        async fn unread_count(
            &self,
            category: Option<NotificationCategory>,
        ) -> ClientResult<i64> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            let guard = self.counts.lock().unwrap();
            Ok(category
                .and_then(|category| guard.get(&category).copied())
                .unwrap_or(0))
        }

        async fn mark_read(&self, id: Uuid) -> ClientResult<NotificationView> {
            let mut marked = view(*self.mark_category.lock().unwrap(), None);
            marked.id = id;
            marked.read_at = Some(Timestamp::now());
            Ok(marked)
        }

        async fn mark_unread(&self, id: Uuid) -> ClientResult<NotificationView> {
            let mut marked = view(*self.mark_category.lock().unwrap(), None);
            marked.id = id;
            marked.read_at = None;
            Ok(marked)
        }

        async fn mark_all_read(
            &self,
            _category: Option<NotificationCategory>,
        ) -> ClientResult<i64> {
            Ok(3)
        }
    }

    fn store(api: Arc<MockApi>) -> InboxStore {
        let config = NotificationsConfig {
            default_page_size: 2,
            max_page_size: 100,
            conversation_scan_pages: 2,
        };
        InboxStore::new(api, &config)
    }

    #[tokio::test]
    async fn overlapping_pages_never_produce_duplicate_ids() {
        let api = Arc::new(MockApi::default());
        let a = view(NotificationCategory::Payment, None);
        let b = view(NotificationCategory::Payment, None);
        let c = view(NotificationCategory::Payment, None);
        api.script(
            NotificationCategory::Payment,
            false,
            vec![
                page(vec![a.clone(), b.clone()], true, Some("cur-1")),
                // Second page overlaps the first on `b`.
                page(vec![b.clone(), c.clone()], false, None),
            ],
        );

        let mut store = store(api);
        store.load_more(NotificationCategory::Payment).await;
        store.load_more(NotificationCategory::Payment).await;

        let cache = store.category(NotificationCategory::Payment);
        let ids: Vec<Uuid> = cache.items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert!(!cache.has_more);
    }

    #[tokio::test]
    async fn load_more_is_a_no_op_once_exhausted() {
        let api = Arc::new(MockApi::default());
        api.script(
            NotificationCategory::Matter,
            false,
            vec![page(vec![view(NotificationCategory::Matter, None)], false, None)],
        );

        let mut store = store(Arc::clone(&api));
        store.load_more(NotificationCategory::Matter).await;
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);

        store.load_more(NotificationCategory::Matter).await;
        store.load_more(NotificationCategory::Matter).await;
        assert_eq!(
            api.list_calls.load(Ordering::SeqCst),
            1,
            "exhausted category must not refetch"
        );
    }

    #[tokio::test]
    async fn refresh_counts_queries_each_category() {
        let api = Arc::new(MockApi::default());
        api.set_count(NotificationCategory::Message, 4);
        api.set_count(NotificationCategory::Payment, 1);

        let mut store = store(Arc::clone(&api));
        store.refresh_counts().await;

        assert_eq!(store.unread_count(NotificationCategory::Message), 4);
        assert_eq!(store.unread_count(NotificationCategory::Payment), 1);
        assert_eq!(store.unread_count(NotificationCategory::System), 0);
        assert_eq!(
            api.count_calls.load(Ordering::SeqCst),
            NotificationCategory::ALL.len()
        );
    }

    #[tokio::test]
    async fn conversation_unread_groups_by_entity_and_respects_page_bound() {
        let api = Arc::new(MockApi::default());
        let estate = Uuid::new_v4();
        let injury = Uuid::new_v4();
        api.script(
            NotificationCategory::Message,
            true,
            vec![
                page(
                    vec![
                        view(NotificationCategory::Message, Some(estate)),
                        view(NotificationCategory::Message, Some(estate)),
                    ],
                    true,
                    Some("cur-1"),
                ),
                page(
                    vec![view(NotificationCategory::Message, Some(injury))],
                    true,
                    Some("cur-2"),
                ),
                // A third page exists but the scan bound is two pages.
                page(
                    vec![view(NotificationCategory::Message, Some(injury))],
                    false,
                    None,
                ),
            ],
        );

        let mut store = store(Arc::clone(&api));
        store.refresh_conversation_unread().await;

        assert_eq!(store.conversation_unread().get(&estate), Some(&2));
        assert_eq!(store.conversation_unread().get(&injury), Some(&1));
        assert_eq!(
            api.list_calls.load(Ordering::SeqCst),
            2,
            "scan must stop at the configured page bound"
        );
    }

    #[tokio::test]
    async fn mark_read_adjusts_counter_and_conversation_map() {
        let api = Arc::new(MockApi::default());
        let conversation = Uuid::new_v4();
        let unread = view(NotificationCategory::Message, Some(conversation));
        api.script(
            NotificationCategory::Message,
            false,
            vec![page(vec![unread.clone()], false, None)],
        );
        api.set_count(NotificationCategory::Message, 1);

        let mut store = store(Arc::clone(&api));
        store.load_more(NotificationCategory::Message).await;
        store.refresh_counts().await;
        store.rederive_conversation_unread_from_cache();
        assert_eq!(store.conversation_unread().get(&conversation), Some(&1));

        store.mark_read(unread.id).await.unwrap();

        assert_eq!(store.unread_count(NotificationCategory::Message), 0);
        assert!(store.conversation_unread().get(&conversation).is_none());
        let cached = &store.category(NotificationCategory::Message).items[0];
        assert!(cached.read_at.is_some());
    }

    #[tokio::test]
    async fn mark_unread_restores_the_counter() {
        let api = Arc::new(MockApi::default());
        let mut item = view(NotificationCategory::Payment, None);
        item.read_at = Some(Timestamp::now());
        api.script(
            NotificationCategory::Payment,
            false,
            vec![page(vec![item.clone()], false, None)],
        );

        api.set_mark_category(NotificationCategory::Payment);
        let mut store = store(Arc::clone(&api));
        store.load_more(NotificationCategory::Payment).await;
        assert_eq!(store.unread_count(NotificationCategory::Payment), 0);

        store.mark_unread(item.id).await.unwrap();
        assert_eq!(store.unread_count(NotificationCategory::Payment), 1);
    }

    #[tokio::test]
    async fn mark_all_read_zeroes_the_counter_and_stamps_items() {
        let api = Arc::new(MockApi::default());
        api.script(
            NotificationCategory::Intake,
            false,
            vec![page(
                vec![
                    view(NotificationCategory::Intake, None),
                    view(NotificationCategory::Intake, None),
                ],
                false,
                None,
            )],
        );
        api.set_count(NotificationCategory::Intake, 2);

        let mut store = store(Arc::clone(&api));
        store.load_more(NotificationCategory::Intake).await;
        store.refresh_counts().await;
        assert_eq!(store.unread_count(NotificationCategory::Intake), 2);

        store
            .mark_all_read(Some(NotificationCategory::Intake))
            .await
            .unwrap();

        assert_eq!(store.unread_count(NotificationCategory::Intake), 0);
        assert!(
            store
                .category(NotificationCategory::Intake)
                .items
                .iter()
                .all(|item| item.read_at.is_some())
        );
    }

    #[tokio::test]
    async fn stream_event_triggers_targeted_refreshes() {
        let api = Arc::new(MockApi::default());
        api.set_count(NotificationCategory::Message, 2);

        let mut store = store(Arc::clone(&api));
        let push = NotificationPush {
            version: shared::models::PUSH_SCHEMA_VERSION,
            notification_id: Uuid::new_v4(),
            category: NotificationCategory::Message,
            created_at: Timestamp::now(),
            title: None,
        };

        store.handle_stream_event(&push).await;

        // One list refresh for the category, one unread scan page, one count.
        assert!(api.list_calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(api.count_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.unread_count(NotificationCategory::Message), 2);
    }

    #[tokio::test]
    async fn stream_event_for_non_message_category_skips_conversation_scan() {
        let api = Arc::new(MockApi::default());
        let mut store = store(Arc::clone(&api));
        let push = NotificationPush {
            version: shared::models::PUSH_SCHEMA_VERSION,
            notification_id: Uuid::new_v4(),
            category: NotificationCategory::Payment,
            created_at: Timestamp::now(),
            title: None,
        };

        store.handle_stream_event(&push).await;

        // Exactly one list call: the payment category refresh.
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derivation_ignores_read_items_and_foreign_entities() {
        let conversation = Uuid::new_v4();
        let mut read_item = view(NotificationCategory::Message, Some(conversation));
        read_item.read_at = Some(Timestamp::now());

        let mut matter_ref = view(NotificationCategory::Message, None);
        matter_ref.entity = Some(EntityRef {
            entity_type: EntityKind::Matter,
            entity_id: Uuid::new_v4(),
        });

        let unread = view(NotificationCategory::Message, Some(conversation));
        let items = vec![read_item, matter_ref, unread];

        let map = derive_conversation_unread(items.iter());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&conversation), Some(&1));
    }
}
