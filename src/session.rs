//! 进程级会话状态：口令、详情缓存、操作槽位、请求序号
//!
//! 在 main 中创建一次，以 `Arc` 显式传给各组件。

use crate::package_manager::details::{CacheKey, DetailsCache};
use crate::package_manager::{Credential, PackageDetails};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 当前进程是否以 root 运行
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// 单调递增的请求序号，用于丢弃过期结果
///
/// 发起请求时 `issue`，应用结果时 `accept`：只有序号大于已应用的最大值才接受。
#[derive(Debug, Default)]
pub struct RequestSequence {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl RequestSequence {
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn accept(&self, seq: u64) -> bool {
        self.applied.fetch_max(seq, Ordering::SeqCst) < seq
    }
}

#[derive(Debug)]
pub struct Session {
    credential: Mutex<Option<Credential>>,
    details_cache: Mutex<DetailsCache>,
    operation_active: AtomicBool,
    pub searches: RequestSequence,
    pub details: RequestSequence,
}

/// 操作槽位占用凭证，drop 时释放
#[derive(Debug)]
pub struct OperationSlot {
    session: Arc<Session>,
}

impl Drop for OperationSlot {
    fn drop(&mut self) {
        self.session.operation_active.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            credential: Mutex::new(None),
            details_cache: Mutex::new(DetailsCache::new(cache_capacity)),
            operation_active: AtomicBool::new(false),
            searches: RequestSequence::default(),
            details: RequestSequence::default(),
        }
    }

    // ===== 口令 =====

    pub fn credential(&self) -> Option<Credential> {
        lock(&self.credential).clone()
    }

    pub fn set_credential(&self, credential: Credential) {
        *lock(&self.credential) = Some(credential);
    }

    pub fn clear_credential(&self) {
        if lock(&self.credential).take().is_some() {
            log::info!("sudo credential discarded");
        }
    }

    // ===== 详情缓存 =====

    pub fn cached_details(&self, key: &CacheKey) -> Option<PackageDetails> {
        lock(&self.details_cache).get(key).cloned()
    }

    pub fn cache_details(&self, key: CacheKey, details: PackageDetails) {
        lock(&self.details_cache).insert(key, details);
    }

    // ===== 操作槽位 =====

    /// 尝试占用唯一的操作槽位；已有操作在运行时返回 None
    pub fn begin_operation(self: &Arc<Self>) -> Option<OperationSlot> {
        self.operation_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| OperationSlot {
                session: Arc::clone(self),
            })
    }

    pub fn operation_running(&self) -> bool {
        self.operation_active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_newer_sequences_are_accepted() {
        let seq = RequestSequence::default();
        let first = seq.issue();
        let second = seq.issue();
        assert!(second > first);
        assert!(seq.accept(second));
        assert!(!seq.accept(first));
        assert!(!seq.accept(second));
        assert!(seq.accept(seq.issue()));
    }

    #[test]
    fn operation_slot_is_exclusive_until_dropped() {
        let session = Arc::new(Session::new(10));
        let slot = session.begin_operation().expect("slot free");
        assert!(session.operation_running());
        assert!(session.begin_operation().is_none());
        drop(slot);
        assert!(!session.operation_running());
        assert!(session.begin_operation().is_some());
    }

    #[test]
    fn credential_can_be_cleared() {
        let session = Session::new(10);
        session.set_credential(Credential::new("pw"));
        assert!(session.credential().is_some());
        session.clear_credential();
        assert!(session.credential().is_none());
    }
}
