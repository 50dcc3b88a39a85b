use kube::CustomResourceExt;
use myapp_operator::MyAppResource;

fn main() -> anyhow::Result<()> {
    let crd = MyAppResource::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
