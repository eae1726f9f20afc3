//! The data model: one module per table, each implementing the ORM traits
//! by hand (record struct, field set, filter inputs, create/update inputs,
//! include tree, row decoding, schema definition).

pub mod account;
pub mod article;
pub mod attachment;
pub mod entreprise;
pub mod entreprise_objet;
pub mod objet;
pub mod secteur;
pub mod session;
pub mod task;
pub mod user;
pub mod user_permission;
pub mod verification_token;

pub use account::{Account, AccountCreate, AccountField, AccountUpdate, AccountWhere, AccountWhereUnique};
pub use article::{
    Article, ArticleCreate, ArticleField, ArticleInclude, ArticleUpdate, ArticleWhere,
    ArticleWhereUnique, ShapeType,
};
pub use attachment::{
    Attachment, AttachmentCreate, AttachmentField, AttachmentTarget, AttachmentUpdate,
    AttachmentWhere, AttachmentWhereUnique,
};
pub use entreprise::{
    Entreprise, EntrepriseCreate, EntrepriseField, EntrepriseInclude, EntrepriseUpdate,
    EntrepriseWhere, EntrepriseWhereUnique,
};
pub use entreprise_objet::{
    EntrepriseObjet, EntrepriseObjetCreate, EntrepriseObjetField, EntrepriseObjetUpdate,
    EntrepriseObjetWhere, EntrepriseObjetWhereUnique,
};
pub use objet::{
    Objet, ObjetCreate, ObjetField, ObjetInclude, ObjetUpdate, ObjetWhere, ObjetWhereUnique,
};
pub use secteur::{
    Secteur, SecteurCreate, SecteurField, SecteurInclude, SecteurUpdate, SecteurWhere,
    SecteurWhereUnique,
};
pub use session::{
    Session, SessionCreate, SessionField, SessionUpdate, SessionWhere, SessionWhereUnique,
};
pub use task::{
    Task, TaskCreate, TaskField, TaskInclude, TaskStatus, TaskType, TaskUpdate, TaskWhere,
    TaskWhereUnique,
};
pub use user::{
    User, UserCreate, UserField, UserInclude, UserRole, UserUpdate, UserWhere, UserWhereUnique,
};
pub use user_permission::{
    UserPermission, UserPermissionCreate, UserPermissionField, UserPermissionUpdate,
    UserPermissionWhere, UserPermissionWhereUnique,
};
pub use verification_token::{
    VerificationToken, VerificationTokenCreate, VerificationTokenField, VerificationTokenUpdate,
    VerificationTokenWhere, VerificationTokenWhereUnique,
};
