pub mod instance_group;
