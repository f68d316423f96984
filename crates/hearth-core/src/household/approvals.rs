use tracing::info;

use hearth_db::{Document, DocumentStore};
use hearth_types::{Approval, Collection, Timestamp};

use super::{Household, Result, list_decoded, new_id};
use crate::hub::Subscription;

/// Approvals newest first.
fn approvals_snapshot(store: &dyn DocumentStore) -> Vec<Approval> {
    let mut approvals: Vec<Approval> = list_decoded(store, Collection::Approvals);
    approvals.sort_by(|a, b| b.approved_at.cmp(&a.approved_at));
    approvals
}

fn new_approval(username: &str, is_admin: bool) -> Approval {
    Approval {
        id: new_id(),
        username: username.to_string(),
        approved_at: Timestamp::now(),
        is_admin,
    }
}

impl Household {
    // -- Approvals --

    pub async fn approvals(&self) -> Vec<Approval> {
        self.read(|store| Ok(approvals_snapshot(store)))
            .await
            .unwrap_or_default()
    }

    /// Record that `username` accepted the rules.
    pub async fn add_approval(&self, username: &str, is_admin: bool) -> Result<Approval> {
        let approval = new_approval(username, is_admin);
        let doc = Document::from_entity(&approval.id, &approval)?;

        self.commit(Collection::Approvals, move |store| {
            store.put(Collection::Approvals, doc)?;
            Ok(((), true))
        })
        .await?;

        info!("Approval recorded for {}", approval.username);
        Ok(approval)
    }

    /// Record an approval for `username` unless one already exists.
    /// Returns the new approval, or `None` if the user had one.
    pub async fn add_approval_once(&self, username: &str, is_admin: bool) -> Result<Option<Approval>> {
        let approval = new_approval(username, is_admin);
        let doc = Document::from_entity(&approval.id, &approval)?;
        let name = approval.username.clone();

        let added = self
            .commit(Collection::Approvals, move |store| {
                // Strict read: a failed check must not turn into a duplicate.
                let exists = store
                    .list(Collection::Approvals)?
                    .iter()
                    .any(|doc| doc.body.get("username").and_then(|u| u.as_str()) == Some(name.as_str()));
                if exists {
                    return Ok((false, false));
                }
                store.put(Collection::Approvals, doc)?;
                Ok((true, true))
            })
            .await?;

        if added {
            info!("Approval recorded for {}", approval.username);
            Ok(Some(approval))
        } else {
            Ok(None)
        }
    }

    pub async fn subscribe_approvals<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(Vec<Approval>) + Send + 'static,
    {
        self.subscribe_with(Collection::Approvals, approvals_snapshot, callback)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::test_support::{durable, local};

    #[tokio::test]
    async fn test_approvals_newest_first() {
        let house = durable();
        house.add_approval("User1", false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        house.add_approval("Ahmed", true).await.unwrap();

        let names: Vec<_> = house.approvals().await.into_iter().map(|a| a.username).collect();
        assert_eq!(names, vec!["Ahmed", "User1"]);
    }

    #[tokio::test]
    async fn test_add_approval_once() {
        let house = local();
        assert!(house.add_approval_once("User3", false).await.unwrap().is_some());
        assert!(house.add_approval_once("User3", false).await.unwrap().is_none());
        assert_eq!(house.approvals().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_approval_once() {
        let house = durable();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let house = house.clone();
                tokio::spawn(async move { house.add_approval_once("User4", false).await })
            })
            .collect();

        let mut recorded = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_some() {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 1);
        assert_eq!(house.approvals().await.len(), 1);
    }
}
