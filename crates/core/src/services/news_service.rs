use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::quote::NewsArticle;
use crate::providers::traits::HeadlineSource;

#[derive(Default)]
struct FeedState {
    articles: Option<Vec<NewsArticle>>,
    error: Option<String>,
}

/// Business headlines, fetched once and then served from memory.
pub struct NewsFeed {
    source: Arc<dyn HeadlineSource>,
    state: Mutex<FeedState>,
    loading: AtomicBool,
}

impl NewsFeed {
    pub fn new(source: Arc<dyn HeadlineSource>) -> Self {
        Self {
            source,
            state: Mutex::new(FeedState::default()),
            loading: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached headlines if already loaded; otherwise fetch them.
    /// A failure is recorded in `error()` and nothing is cached.
    pub async fn fetch_top_headlines(&self) -> Result<Vec<NewsArticle>, CoreError> {
        if let Some(articles) = &self.lock().articles {
            debug!(count = articles.len(), "Serving cached headlines");
            return Ok(articles.clone());
        }

        self.loading.store(true, Ordering::SeqCst);
        let result = self.source.top_headlines().await;
        self.loading.store(false, Ordering::SeqCst);

        let mut state = self.lock();
        match result {
            Ok(articles) => {
                state.error = None;
                state.articles = Some(articles.clone());
                Ok(articles)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch headlines");
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Forget the cached headlines so the next fetch goes upstream.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.articles = None;
        state.error = None;
    }

    pub fn articles(&self) -> Vec<NewsArticle> {
        self.lock().articles.clone().unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().articles.is_some()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}
