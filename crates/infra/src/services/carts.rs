use chrono::Utc;
use serde_json::Value as JsonValue;

use groupbuy_carts::{
    AddItem, BeginCheckout, Cart, CartCommand, CartId, CartItemId, CartStatus, ConfirmPayment,
    OpenCart, RemoveItem,
};
use groupbuy_catalog::{CatalogProvider, ProductId};
use groupbuy_core::{AggregateId, AggregateRoot, BuyerId, DomainError, DomainResult, ExpectedVersion};
use groupbuy_events::{execute, EventBus, EventEnvelope};

use crate::store::{CommitBatch, EntityStore};

use super::{envelopes_for, publish_all};

/// Buyer-facing cart operations.
///
/// The only place product snapshots are captured: `add_item` reads the
/// catalog once and freezes the record into the cart item.
#[derive(Debug)]
pub struct CartService<S, B, C> {
    store: S,
    bus: B,
    catalog: C,
}

impl<S, B, C> CartService<S, B, C>
where
    S: EntityStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    C: CatalogProvider,
{
    pub fn new(store: S, bus: B, catalog: C) -> Self {
        Self { store, bus, catalog }
    }

    pub fn cart(&self, cart_id: CartId) -> DomainResult<Cart> {
        self.store.cart(cart_id)?.ok_or(DomainError::NotFound)
    }

    pub fn carts(&self) -> DomainResult<Vec<Cart>> {
        Ok(self.store.carts()?)
    }

    pub fn open_cart(&self, buyer_id: BuyerId) -> DomainResult<CartId> {
        let cart_id = CartId::new(AggregateId::new());
        let mut cart = Cart::empty(cart_id);
        let events = execute(
            &mut cart,
            &CartCommand::OpenCart(OpenCart {
                cart_id,
                buyer_id,
                occurred_at: Utc::now(),
            }),
        )?;

        self.commit(cart, ExpectedVersion::Exact(0), 0, &events)?;
        tracing::debug!(%cart_id, "cart opened");
        Ok(cart_id)
    }

    pub fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u64,
    ) -> DomainResult<CartItemId> {
        let record = self.catalog.product(product_id)?;
        let item_id = CartItemId::new(AggregateId::new());

        let mut cart = self.cart(cart_id)?;
        let base_version = cart.version();
        let events = execute(
            &mut cart,
            &CartCommand::AddItem(AddItem {
                cart_id,
                item_id,
                product_id,
                quantity,
                snapshot: record.snapshot(Utc::now()),
                occurred_at: Utc::now(),
            }),
        )?;

        self.commit(cart, ExpectedVersion::Exact(base_version), base_version, &events)?;
        Ok(item_id)
    }

    pub fn remove_item(&self, cart_id: CartId, item_id: CartItemId) -> DomainResult<()> {
        let mut cart = self.cart(cart_id)?;
        let base_version = cart.version();
        let events = execute(
            &mut cart,
            &CartCommand::RemoveItem(RemoveItem {
                cart_id,
                item_id,
                occurred_at: Utc::now(),
            }),
        )?;

        self.commit(cart, ExpectedVersion::Exact(base_version), base_version, &events)
    }

    pub fn begin_checkout(&self, cart_id: CartId) -> DomainResult<()> {
        let mut cart = self.cart(cart_id)?;
        let base_version = cart.version();
        let events = execute(
            &mut cart,
            &CartCommand::BeginCheckout(BeginCheckout {
                cart_id,
                occurred_at: Utc::now(),
            }),
        )?;

        self.commit(cart, ExpectedVersion::Exact(base_version), base_version, &events)
    }

    /// Consume the payment collaborator's signal. Only success moves the
    /// cart; a failed payment leaves it pending for another attempt.
    pub fn record_payment(&self, cart_id: CartId, success: bool) -> DomainResult<CartStatus> {
        let mut cart = self.cart(cart_id)?;

        if !success {
            tracing::info!(%cart_id, "payment failed; cart left pending");
            return Ok(cart.status());
        }

        let base_version = cart.version();
        let events = execute(
            &mut cart,
            &CartCommand::ConfirmPayment(ConfirmPayment {
                cart_id,
                occurred_at: Utc::now(),
            }),
        )?;
        let status = cart.status();

        self.commit(cart, ExpectedVersion::Exact(base_version), base_version, &events)?;
        tracing::info!(%cart_id, "cart paid");
        Ok(status)
    }

    /// Delete a draft cart together with the items it owns.
    pub fn delete_draft(&self, cart_id: CartId) -> DomainResult<()> {
        let cart = self.cart(cart_id)?;
        if cart.status() != CartStatus::Draft {
            return Err(DomainError::validation("only draft carts can be deleted"));
        }

        self.store.commit(
            CommitBatch::default().remove_cart(ExpectedVersion::Exact(cart.version()), cart_id),
        )?;
        tracing::debug!(%cart_id, "draft cart deleted");
        Ok(())
    }

    fn commit(
        &self,
        cart: Cart,
        expected: ExpectedVersion,
        base_version: u64,
        events: &[groupbuy_carts::CartEvent],
    ) -> DomainResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let envelopes = envelopes_for(cart.id_typed().0, "carts.cart", base_version, events);
        self.store
            .commit(CommitBatch::default().put_cart(expected, cart))?;
        publish_all(&self.bus, envelopes);
        Ok(())
    }
}
