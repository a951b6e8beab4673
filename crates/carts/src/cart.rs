use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_catalog::{ProductId, ProductSnapshot};
use groupbuy_core::{Aggregate, AggregateId, AggregateRoot, BuyerId, DomainError};
use groupbuy_events::Event;

/// Cart identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

impl CartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cart item identifier. Lots reference items by this id; it must stay
/// stable across consolidation recomputations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(pub AggregateId);

impl CartItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cart status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Draft,
    PendingPayment,
    Paid,
    /// Terminal: the cart's items have been absorbed into lots.
    TransferredToLots,
}

/// One cart line: quantity plus the product facts frozen at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub snapshot: ProductSnapshot,
}

/// Aggregate root: Cart.
///
/// Owns its items exclusively - removing the cart removes the items. The
/// lot membership that later claims an item is a weak reference held on the
/// lot side, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    buyer_id: Option<BuyerId>,
    status: CartStatus,
    items: Vec<CartItem>,
    version: u64,
    created: bool,
}

impl Cart {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            buyer_id: None,
            status: CartStatus::Draft,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    pub fn status(&self) -> CartStatus {
        self.status
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, CartStatus::Draft)
    }

    /// Whether the consolidation engine may pool this cart's items.
    pub fn is_eligible_for_consolidation(&self) -> bool {
        matches!(
            self.status,
            CartStatus::Paid | CartStatus::TransferredToLots
        )
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCart {
    pub cart_id: CartId,
    pub buyer_id: BuyerId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
///
/// The snapshot is captured by the caller from the catalog at command time;
/// the aggregate validates the quantity against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub snapshot: ProductSnapshot,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BeginCheckout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginCheckout {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment (the payment collaborator's success signal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkTransferred (all items absorbed into lots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkTransferred {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    OpenCart(OpenCart),
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    BeginCheckout(BeginCheckout),
    ConfirmPayment(ConfirmPayment),
    MarkTransferred(MarkTransferred),
}

/// Event: CartOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub cart_id: CartId,
    pub buyer_id: BuyerId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub snapshot: ProductSnapshot,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CheckoutStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStarted {
    pub cart_id: CartId,
    pub from: CartStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub cart_id: CartId,
    pub from: CartStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartTransferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTransferred {
    pub cart_id: CartId,
    pub from: CartStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    ItemAdded(ItemAdded),
    ItemRemoved(ItemRemoved),
    CheckoutStarted(CheckoutStarted),
    PaymentConfirmed(PaymentConfirmed),
    CartTransferred(CartTransferred),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "carts.cart.opened",
            CartEvent::ItemAdded(_) => "carts.cart.item_added",
            CartEvent::ItemRemoved(_) => "carts.cart.item_removed",
            CartEvent::CheckoutStarted(_) => "carts.cart.checkout_started",
            CartEvent::PaymentConfirmed(_) => "carts.cart.payment_confirmed",
            CartEvent::CartTransferred(_) => "carts.cart.transferred",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CheckoutStarted(e) => e.occurred_at,
            CartEvent::PaymentConfirmed(e) => e.occurred_at,
            CartEvent::CartTransferred(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.buyer_id = Some(e.buyer_id);
                self.status = CartStatus::Draft;
                self.items.clear();
                self.created = true;
            }
            CartEvent::ItemAdded(e) => {
                self.items.push(CartItem {
                    item_id: e.item_id,
                    product_id: e.product_id,
                    quantity: e.quantity,
                    snapshot: e.snapshot.clone(),
                });
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.item_id != e.item_id);
            }
            CartEvent::CheckoutStarted(_) => {
                self.status = CartStatus::PendingPayment;
            }
            CartEvent::PaymentConfirmed(_) => {
                self.status = CartStatus::Paid;
            }
            CartEvent::CartTransferred(_) => {
                self.status = CartStatus::TransferredToLots;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::OpenCart(cmd) => self.handle_open(cmd),
            CartCommand::AddItem(cmd) => self.handle_add_item(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            CartCommand::BeginCheckout(cmd) => self.handle_begin_checkout(cmd),
            CartCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            CartCommand::MarkTransferred(cmd) => self.handle_mark_transferred(cmd),
        }
    }
}

impl Cart {
    fn ensure_cart_id(&self, cart_id: CartId) -> Result<(), DomainError> {
        if self.id != cart_id {
            return Err(DomainError::validation("cart_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenCart) -> Result<Vec<CartEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("cart already exists"));
        }

        Ok(vec![CartEvent::CartOpened(CartOpened {
            cart_id: cmd.cart_id,
            buyer_id: cmd.buyer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_cart_id(cmd.cart_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::validation(
                "cannot modify a cart once checkout has started",
            ));
        }

        if cmd.snapshot.product_id != cmd.product_id {
            return Err(DomainError::validation(
                "snapshot does not match the product being added",
            ));
        }

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        if !cmd.snapshot.accepts_quantity(cmd.quantity) {
            return Err(DomainError::validation(format!(
                "quantity {} must be a multiple of {} and at least {}",
                cmd.quantity, cmd.snapshot.min_fraction_per_user, cmd.snapshot.customer_moq
            )));
        }

        if self.item(cmd.item_id).is_some() {
            return Err(DomainError::conflict("cart item already exists"));
        }

        Ok(vec![CartEvent::ItemAdded(ItemAdded {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            snapshot: cmd.snapshot.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_cart_id(cmd.cart_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::validation(
                "cannot modify a cart once checkout has started",
            ));
        }

        if self.item(cmd.item_id).is_none() {
            return Err(DomainError::not_found());
        }

        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_checkout(&self, cmd: &BeginCheckout) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_cart_id(cmd.cart_id)?;

        if self.status != CartStatus::Draft {
            return Err(DomainError::invalid_transition(
                "cart",
                format!("{:?}", self.status),
                format!("{:?}", CartStatus::PendingPayment),
            ));
        }

        if self.items.is_empty() {
            return Err(DomainError::validation("cannot check out an empty cart"));
        }

        Ok(vec![CartEvent::CheckoutStarted(CheckoutStarted {
            cart_id: cmd.cart_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(&self, cmd: &ConfirmPayment) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_cart_id(cmd.cart_id)?;

        if self.status != CartStatus::PendingPayment {
            return Err(DomainError::invalid_transition(
                "cart",
                format!("{:?}", self.status),
                format!("{:?}", CartStatus::Paid),
            ));
        }

        Ok(vec![CartEvent::PaymentConfirmed(PaymentConfirmed {
            cart_id: cmd.cart_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_transferred(&self, cmd: &MarkTransferred) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_cart_id(cmd.cart_id)?;

        if self.status != CartStatus::Paid {
            return Err(DomainError::invalid_transition(
                "cart",
                format!("{:?}", self.status),
                format!("{:?}", CartStatus::TransferredToLots),
            ));
        }

        Ok(vec![CartEvent::CartTransferred(CartTransferred {
            cart_id: cmd.cart_id,
            from: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
