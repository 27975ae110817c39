pub mod compliance;
pub mod dispatch;
pub mod fleet;
pub mod payment;
pub mod prescription;
pub mod route;
pub mod settings;
pub mod staff;
pub mod subscription;
pub mod vendor;

pub use compliance::{ComplianceRecord, ComplianceStatus, DocumentType};
pub use dispatch::{
    Dispatch, DispatchSchedule, DispatchStatus, NewPassenger, Passenger, PassengerCounts,
    PassengerStatus,
};
pub use fleet::{Bus, BusStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use prescription::{Medication, Prescription, PrescriptionStatus};
pub use route::BusRoute;
pub use settings::{NotificationSettings, SettingsPatch, VendorSettings};
pub use staff::{StaffMember, StaffRole, StaffStatus};
pub use subscription::{
    BillingCycle, Plan, Subscription, SubscriptionPayment, SubscriptionStatus, UsageResource,
};
pub use vendor::Vendor;
