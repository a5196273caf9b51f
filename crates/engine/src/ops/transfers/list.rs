use sea_orm::{
    Condition, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};

use crate::{PageRequest, Paged, ResultEngine, Transfer, transfers};

use super::super::{Engine, with_tx};

/// Filters for listing transfers.
#[derive(Clone, Debug, Default)]
pub struct TransferListFilter {
    /// Only transfers where this account is the source or the destination.
    pub user_id: Option<i64>,
}

impl TransferListFilter {
    #[must_use]
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

impl Engine {
    /// Lists transfers, newest first (`created_at DESC, id DESC`).
    ///
    /// `total` counts every transfer matching the filter, regardless of the
    /// requested page.
    pub async fn list_transfers(
        &self,
        filter: &TransferListFilter,
        page: PageRequest,
    ) -> ResultEngine<Paged<Transfer>> {
        with_tx!(self, |db_tx| {
            let mut query = transfers::Entity::find();
            if let Some(user_id) = filter.user_id {
                query = query.filter(
                    Condition::any()
                        .add(transfers::Column::FromUserId.eq(user_id))
                        .add(transfers::Column::ToUserId.eq(user_id)),
                );
            }

            let total = query.clone().count(&db_tx).await?;
            let items = query
                .order_by_desc(transfers::Column::CreatedAt)
                .order_by_desc(transfers::Column::Id)
                .offset(page.offset())
                .limit(page.page_size())
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Transfer::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            Ok(Paged {
                items,
                page: page.page(),
                page_size: page.page_size(),
                total,
            })
        })
    }
}
