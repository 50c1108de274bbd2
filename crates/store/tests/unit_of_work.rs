//! Integration tests for the unit of work over the in-memory backend.

use std::collections::BTreeSet;

use common::{Money, UserId};
use domain::{
    Cart, CartRepository, NewProduct, Product, ProductRepository, RepositoryError,
};
use store::{InMemoryBackend, StoreError, TransactionHandler, UnitOfWork};
use tokio_util::sync::CancellationToken;

fn product(name: &str) -> Product {
    Product::create(NewProduct {
        name: name.to_string(),
        description: String::new(),
        price: Money::parse("BRL", "10.00").unwrap(),
        stock: 5,
        image_url: None,
        categories: BTreeSet::new(),
    })
    .unwrap()
}

mod commit_and_rollback {
    use super::*;

    #[tokio::test]
    async fn writes_become_visible_on_commit() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let widget = product("Widget");

        uow.products().create_product(&widget, &cancel).await.unwrap();
        assert!(backend.product(widget.id()).await.is_none());

        uow.commit(&cancel, false).await.unwrap();
        assert_eq!(backend.product(widget.id()).await.unwrap().name(), "Widget");
    }

    #[tokio::test]
    async fn own_writes_are_readable_before_commit() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let widget = product("Widget");

        uow.products().create_product(&widget, &cancel).await.unwrap();
        let other_handle = uow.products();
        let seen = other_handle
            .get_product_by_id(widget.id(), &cancel)
            .await
            .unwrap();
        assert_eq!(seen, Some(widget));
    }

    #[tokio::test]
    async fn other_units_do_not_see_uncommitted_writes() {
        let backend = InMemoryBackend::new();
        let writer = UnitOfWork::begin(backend.clone()).await.unwrap();
        let reader = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let widget = product("Widget");

        writer.products().create_product(&widget, &cancel).await.unwrap();
        let seen = reader
            .products()
            .get_product_by_id(widget.id(), &cancel)
            .await
            .unwrap();
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn rollback_is_idempotent_and_handles_survive() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let products = uow.products();
        let discarded = product("Discarded");

        products.create_product(&discarded, &cancel).await.unwrap();
        uow.rollback().await.unwrap();
        uow.rollback().await.unwrap();
        assert!(backend.product(discarded.id()).await.is_none());

        let kept = product("Kept");
        products.create_product(&kept, &cancel).await.unwrap();
        uow.commit(&cancel, false).await.unwrap();
        assert!(backend.product(kept.id()).await.is_some());
        assert!(backend.product(discarded.id()).await.is_none());
    }

    #[tokio::test]
    async fn rollback_after_returns_the_original_error() {
        let uow = UnitOfWork::begin(InMemoryBackend::new()).await.unwrap();
        let original = RepositoryError::Connection("lost".to_string());
        let returned = uow.rollback_after(original.clone()).await;
        assert_eq!(returned, original);
    }

    #[tokio::test]
    async fn failed_commit_discards_work_and_reopens() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let widget = product("Widget");

        uow.products().create_product(&widget, &cancel).await.unwrap();
        backend.fail_commit(true);
        let err = uow.commit(&cancel, false).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(backend.product(widget.id()).await.is_none());

        backend.fail_commit(false);
        uow.products().create_product(&widget, &cancel).await.unwrap();
        uow.commit(&cancel, false).await.unwrap();
        assert!(backend.product(widget.id()).await.is_some());
    }

    #[tokio::test]
    async fn close_discards_open_work() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let cart = Cart::create(UserId::new("alice"), "BRL".parse().unwrap());

        uow.carts().create_cart(&cart, &cancel).await.unwrap();
        uow.close().await;
        assert!(backend.cart_of(&UserId::new("alice")).await.is_none());
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn cancelled_commit_commits_nothing() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let widget = product("Widget");

        uow.products().create_product(&widget, &cancel).await.unwrap();
        cancel.cancel();

        assert_eq!(
            uow.commit(&cancel, false).await.unwrap_err(),
            StoreError::Cancelled
        );
        uow.rollback().await.unwrap();
        assert!(backend.product(widget.id()).await.is_none());
    }

    #[tokio::test]
    async fn cancelled_repository_call_fails() {
        let uow = UnitOfWork::begin(InMemoryBackend::new()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = uow
            .products()
            .create_product(&product("Widget"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::Cancelled);
    }
}

mod external_control {
    use super::*;

    #[tokio::test]
    async fn inner_commit_is_deferred_until_handler_succeeds() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let token = CancellationToken::new();
        let cancel = &token;
        let widget = product("Widget");
        let probe = backend.clone();
        let id = widget.id();

        let handler = TransactionHandler::new(&uow);
        handler
            .execute(cancel, |uow| async move {
                assert!(uow.is_externally_controlled());
                uow.products().create_product(&widget, cancel).await?;
                uow.commit(cancel, false).await?;
                assert!(probe.product(id).await.is_none());
                Ok::<_, RepositoryError>(())
            })
            .await
            .unwrap();

        assert!(!uow.is_externally_controlled());
        assert!(backend.product(id).await.is_some());
    }

    #[tokio::test]
    async fn failing_operation_rolls_back_everything() {
        let backend = InMemoryBackend::new();
        let uow = UnitOfWork::begin(backend.clone()).await.unwrap();
        let token = CancellationToken::new();
        let cancel = &token;
        let widget = product("Widget");
        let id = widget.id();

        let handler = TransactionHandler::new(&uow);
        let result: Result<(), RepositoryError> = handler
            .execute(cancel, |uow| async move {
                uow.products().create_product(&widget, cancel).await?;
                uow.commit(cancel, false).await?;
                Err(RepositoryError::Constraint("boom".to_string()))
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            RepositoryError::Constraint("boom".to_string())
        );
        assert!(!uow.is_externally_controlled());
        assert!(backend.product(id).await.is_none());
    }
}
