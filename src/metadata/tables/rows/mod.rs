//! Raw row definitions for all 45 metadata tables.
//!
//! One module per table, each defining the `XxxRaw` struct with the table's
//! byte-exact column schema (ECMA-335 II.22) and its [`crate::metadata::tables::RowReadable`]
//! and [`crate::metadata::tables::RowWritable`] implementations. Heap columns
//! hold heap offsets, simple index columns hold 1-based row numbers, and
//! coded columns hold decoded [`crate::metadata::tables::CodedIndex`] values.

mod assembly;
mod assemblyos;
mod assemblyprocessor;
mod assemblyref;
mod assemblyrefos;
mod assemblyrefprocessor;
mod classlayout;
mod constant;
mod customattribute;
mod declsecurity;
mod enclog;
mod encmap;
mod event;
mod eventmap;
mod eventptr;
mod exportedtype;
mod field;
mod fieldlayout;
mod fieldmarshal;
mod fieldptr;
mod fieldrva;
mod filetable;
mod genericparam;
mod genericparamconstraint;
mod implmap;
mod interfaceimpl;
mod manifestresource;
mod memberref;
mod methoddef;
mod methodimpl;
mod methodptr;
mod methodsemantics;
mod methodspec;
mod module;
mod moduleref;
mod nestedclass;
mod param;
mod paramptr;
mod property;
mod propertymap;
mod propertyptr;
mod standalonesig;
mod typedef;
mod typeref;
mod typespec;

pub use assembly::AssemblyRaw;
pub use assemblyos::AssemblyOsRaw;
pub use assemblyprocessor::AssemblyProcessorRaw;
pub use assemblyref::AssemblyRefRaw;
pub use assemblyrefos::AssemblyRefOsRaw;
pub use assemblyrefprocessor::AssemblyRefProcessorRaw;
pub use classlayout::ClassLayoutRaw;
pub use constant::ConstantRaw;
pub use customattribute::CustomAttributeRaw;
pub use declsecurity::DeclSecurityRaw;
pub use enclog::EncLogRaw;
pub use encmap::EncMapRaw;
pub use event::EventRaw;
pub use eventmap::EventMapRaw;
pub use eventptr::EventPtrRaw;
pub use exportedtype::ExportedTypeRaw;
pub use field::FieldRaw;
pub use fieldlayout::FieldLayoutRaw;
pub use fieldmarshal::FieldMarshalRaw;
pub use fieldptr::FieldPtrRaw;
pub use fieldrva::FieldRvaRaw;
pub use filetable::FileRaw;
pub use genericparam::GenericParamRaw;
pub use genericparamconstraint::GenericParamConstraintRaw;
pub use implmap::ImplMapRaw;
pub use interfaceimpl::InterfaceImplRaw;
pub use manifestresource::ManifestResourceRaw;
pub use memberref::MemberRefRaw;
pub use methoddef::MethodDefRaw;
pub use methodimpl::MethodImplRaw;
pub use methodptr::MethodPtrRaw;
pub use methodsemantics::MethodSemanticsRaw;
pub use methodspec::MethodSpecRaw;
pub use module::ModuleRaw;
pub use moduleref::ModuleRefRaw;
pub use nestedclass::NestedClassRaw;
pub use param::ParamRaw;
pub use paramptr::ParamPtrRaw;
pub use property::PropertyRaw;
pub use propertymap::PropertyMapRaw;
pub use propertyptr::PropertyPtrRaw;
pub use standalonesig::StandAloneSigRaw;
pub use typedef::TypeDefRaw;
pub use typeref::TypeRefRaw;
pub use typespec::TypeSpecRaw;
